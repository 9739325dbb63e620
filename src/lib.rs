#![doc = "The `taskpad` library crate."]
#![doc = ""]
#![doc = "Task-tracking REST backend: user accounts with bearer-token sessions,"]
#![doc = "per-owner task CRUD, avatar upload and serving, and account emails."]
#![doc = "The binary (`main.rs`) wires these modules into the running server;"]
#![doc = "integration tests build the same app from the pieces exported here."]

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod models;
pub mod routes;
pub mod storage;
