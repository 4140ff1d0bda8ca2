pub mod db;
pub mod mail;
pub mod queue;
pub mod redis;
pub mod storage;
