//! Route modules for Folio Server

pub mod files;
pub mod health;
pub mod pages;
