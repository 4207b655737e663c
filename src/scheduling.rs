pub mod bucket;
pub mod conflicts;
pub mod interval;
pub mod ordering;
