pub mod enriched;
pub mod record;
pub mod table;
