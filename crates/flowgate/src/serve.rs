use std::convert::Infallible;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::filters::Pipeline;
use crate::http::response::string_response;
use crate::http::{Body, StatusCode};
use crate::*;

/// A minimal accept loop that drives every connection through one
/// [`Pipeline`]. When no filter produces a response the request is answered
/// with 404.
pub struct Server {
	address: SocketAddr,
	listener: TcpListener,
	pipeline: Arc<Pipeline>,
	shutdown: CancellationToken,
}

impl Server {
	pub async fn bind(address: SocketAddr, pipeline: Arc<Pipeline>) -> anyhow::Result<Server> {
		let listener = TcpListener::bind(address).await?;
		let address = listener.local_addr()?;
		Ok(Server {
			address,
			listener,
			pipeline,
			shutdown: CancellationToken::new(),
		})
	}

	/// The bound address; useful when binding port 0.
	pub fn local_addr(&self) -> SocketAddr {
		self.address
	}

	/// A token that stops the accept loop (and in-flight connections) when
	/// cancelled.
	pub fn shutdown_trigger(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	pub async fn serve(self) {
		info!(address = %self.address, "server started");
		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => {
					info!(address = %self.address, "server stopped");
					return;
				},
				res = self.listener.accept() => {
					let (stream, peer) = match res {
						Ok(conn) => conn,
						Err(e) => {
							warn!(err = %e, "accept failed");
							continue;
						},
					};
					debug!(peer = %peer, "connection opened");
					let pipeline = self.pipeline.clone();
					let shutdown = self.shutdown.clone();
					tokio::spawn(async move {
						let io = TokioIo::new(stream);
						let service = service_fn(move |req: ::http::Request<Incoming>| {
							let pipeline = pipeline.clone();
							async move {
								let req = req.map(Body::new);
								let resp = match pipeline.execute(req).await {
									Some(resp) => resp,
									None => string_response(StatusCode::NOT_FOUND, None, "Not Found\n"),
								};
								Ok::<_, Infallible>(resp)
							}
						});
						let builder = auto::Builder::new(TokioExecutor::new());
						tokio::select! {
							_ = shutdown.cancelled() => {},
							res = builder.serve_connection(io, service) => {
								if let Err(e) = res {
									debug!(peer = %peer, err = %e, "connection closed with error");
								}
							},
						}
					});
				},
			}
		}
	}
}

#[cfg(test)]
#[path = "serve_test.rs"]
mod tests;
