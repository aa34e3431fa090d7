pub mod instances;
pub mod zones;
