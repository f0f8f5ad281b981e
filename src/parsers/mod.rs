pub mod rpgmaker;
pub mod tabular;
