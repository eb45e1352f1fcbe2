pub mod accounts;
pub mod chain;
pub mod container;
pub mod deployer;
pub mod error;
pub mod fixture;
pub mod fuel_chain;
pub mod local_chain;
pub mod shared;
pub mod tasks;
