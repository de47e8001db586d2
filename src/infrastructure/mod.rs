pub mod storage;
pub mod web;
