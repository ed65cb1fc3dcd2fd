mod client;
mod helpers;

pub use client::{ClientOptions, Exchange, HttpClient, HttpResponse, Method, ProbeRequest};
