pub mod export;
pub mod generate;
pub mod health;
pub mod providers;
pub mod test_cases;
pub mod transcripts;
