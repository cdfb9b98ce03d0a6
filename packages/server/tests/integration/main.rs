mod common;
mod http;
mod processor;
