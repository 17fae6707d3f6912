//! Blocking TCP client
//!
//! One request in flight at a time; server errors come back as
//! [`ListError::Remote`] with the kind the server reported.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{ListError, Result};
use crate::protocol::{read_response, write_command, Command};

/// Client connection to a listkv server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| ListError::Network(format!("connect: {}", e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Fail calls that wait longer than `timeout` for a response
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        self.writer.get_ref().set_write_timeout(Some(timeout))?;
        Ok(())
    }

    /// Send one command and wait for its response
    pub fn call(&mut self, command: &Command) -> Result<Option<i64>> {
        write_command(&mut self.writer, command).map_err(into_network)?;
        let response = read_response(&mut self.reader).map_err(into_network)?;
        response.into_result()
    }

    pub fn create(&mut self, key: &str) -> Result<()> {
        self.call(&Command::Create {
            key: key.to_string(),
        })
        .map(|_| ())
    }

    pub fn append(&mut self, key: &str, value: i64) -> Result<()> {
        self.call(&Command::Append {
            key: key.to_string(),
            value,
        })
        .map(|_| ())
    }

    pub fn get(&mut self, key: &str, index: i64) -> Result<i64> {
        let value = self.call(&Command::Get {
            key: key.to_string(),
            index,
        })?;
        expect_value(value, "GET")
    }

    pub fn remove(&mut self, key: &str) -> Result<i64> {
        let value = self.call(&Command::Remove {
            key: key.to_string(),
        })?;
        expect_value(value, "REMOVE")
    }

    pub fn size(&mut self, key: &str) -> Result<usize> {
        let value = self.call(&Command::Size {
            key: key.to_string(),
        })?;
        let size = expect_value(value, "SIZE")?;
        usize::try_from(size)
            .map_err(|_| ListError::Protocol(format!("SIZE returned negative length {}", size)))
    }

    pub fn ping(&mut self) -> Result<()> {
        self.call(&Command::Ping).map(|_| ())
    }
}

fn expect_value(value: Option<i64>, command: &str) -> Result<i64> {
    value.ok_or_else(|| ListError::Protocol(format!("{} response carried no value", command)))
}

/// Socket failures on the client side are network errors, not store I/O
fn into_network(err: ListError) -> ListError {
    match err {
        ListError::Io(e) => ListError::Network(e.to_string()),
        other => other,
    }
}
