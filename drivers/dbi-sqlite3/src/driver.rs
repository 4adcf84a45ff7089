///
/// Driver registration.
///
/// `DRIVER_INFO` is what the host sees when it enumerates drivers;
/// `Sqlite3Driver` is the entry point it uses to open datasources.
///

use dbi_core::{
    DriverInfo, CAP_BIND_BY_VALUE, CAP_CHARSET_SUPPORT, CAP_HAS_EXECRAW, CAP_HAS_NUMBER_SUPPORT,
    CAP_LOB_SUPPORT, CAP_TRANSACTION_MANAGEMENT,
};

use crate::config::Config;
use crate::connection::Connection;
use crate::error::Result;

pub const DRIVER_NAME: &str = "sqlite3";

pub const DRIVER_INFO: DriverInfo = DriverInfo::new(
    DRIVER_NAME,
    CAP_LOB_SUPPORT
        | CAP_TRANSACTION_MANAGEMENT
        | CAP_BIND_BY_VALUE
        | CAP_HAS_EXECRAW
        | CAP_CHARSET_SUPPORT
        | CAP_HAS_NUMBER_SUPPORT,
);

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite3Driver;

impl Sqlite3Driver {
    pub fn info(&self) -> DriverInfo {
        DRIVER_INFO
    }

    pub fn open(&self, config: Config) -> Result<Connection> {
        Connection::open(config)
    }

    /// Open a `[sqlite3:]database[{key=value,...}]` datasource string.
    pub fn open_datasource(&self, datasource: &str) -> Result<Connection> {
        self.open(Config::from_datasource(datasource)?)
    }
}
