//! Link module - Producer and consumer ends of a telemetry link
//!
//! Provides:
//! - Producer: samples a measurement each period and writes one frame
//! - Consumer: reads whatever bytes arrive and reassembles packets
//! - TCP helpers standing in for the serial link

mod producer;
mod consumer;

pub use producer::*;
pub use consumer::*;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// Link errors
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Link closed with {pending} bytes of an incomplete frame")]
    Closed { pending: usize },
}

pub type LinkResult<T> = Result<T, LinkError>;

/// Connect the transmitting end to a listening receiver
pub async fn connect(address: &str) -> LinkResult<TcpStream> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    tracing::info!("Connected to receiver at {}", stream.peer_addr()?);
    Ok(stream)
}

/// Bind the receiving end
pub async fn listen(address: &str) -> LinkResult<TcpListener> {
    let listener = TcpListener::bind(address).await?;
    tracing::info!("Listening for transmitters on {}", listener.local_addr()?);
    Ok(listener)
}
