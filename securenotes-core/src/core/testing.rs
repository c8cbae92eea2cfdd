//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::io::{self, Read, Write};

use crate::core::crypto::{CryptoGateway, SealingSink};
use crate::{NoteStoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Encrypt(String),
    Decrypt(String),
    Erase(String),
}

/// Passthrough gateway that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingGateway {
    calls: RefCell<Vec<GatewayCall>>,
    fail_encrypt: RefCell<Option<String>>,
    fail_decrypt: RefCell<Option<String>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn count(&self, call: &GatewayCall) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    /// Makes every encrypting sink for `name` fail to open.
    pub fn fail_encrypt_for(&self, name: &str) {
        *self.fail_encrypt.borrow_mut() = Some(name.to_string());
    }

    /// Makes every decrypting source for `name` fail to open.
    pub fn fail_decrypt_for(&self, name: &str) {
        *self.fail_decrypt.borrow_mut() = Some(name.to_string());
    }
}

impl CryptoGateway for RecordingGateway {
    fn encrypting_sink<'a>(
        &self,
        name: &str,
        out: Box<dyn Write + 'a>,
    ) -> Result<Box<dyn SealingSink + 'a>> {
        self.calls
            .borrow_mut()
            .push(GatewayCall::Encrypt(name.to_string()));
        if self.fail_encrypt.borrow().as_deref() == Some(name) {
            return Err(NoteStoreError::Crypto("key store unavailable".to_string()));
        }
        Ok(Box::new(PlainSink { out }))
    }

    fn decrypting_source<'a>(
        &self,
        name: &str,
        input: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn Read + 'a>> {
        self.calls
            .borrow_mut()
            .push(GatewayCall::Decrypt(name.to_string()));
        if self.fail_decrypt.borrow().as_deref() == Some(name) {
            return Err(NoteStoreError::Crypto("bad key".to_string()));
        }
        Ok(input)
    }

    fn erase_key(&self, name: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(GatewayCall::Erase(name.to_string()));
        Ok(())
    }
}

struct PlainSink<'a> {
    out: Box<dyn Write + 'a>,
}

impl Write for PlainSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl SealingSink for PlainSink<'_> {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
