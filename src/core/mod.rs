pub mod end_use_balance;
pub mod table;
pub mod units;
