//! Record DAO ports for the locally captured entities

pub mod ports;
