mod config;
mod context;
mod transfer;
