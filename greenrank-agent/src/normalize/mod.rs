//! Normalization layer: unit conversion, canonicalization, imputation
//!
//! Pure functions only. Parsers are total in practice: anything the
//! normalizer cannot interpret leaves the field missing and falls into the
//! imputation/validation path instead of aborting the record.

pub mod imputation;
pub mod synonyms;
pub mod units;
