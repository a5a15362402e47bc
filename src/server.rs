use crate::webhook::{WebhookHandler, WebhookResponse};
use log::{debug, error, info};
use std::{
    io::Read,
    net::SocketAddr,
    sync::Arc,
    thread::{self, JoinHandle},
};
use thiserror::Error;
use tiny_http::{Method, Request, Response, Server};

/// The address the webhook listener binds to.
pub const LISTEN_ADDRESS: &str = "0.0.0.0:8000";
/// The only route that is handled.
pub const WEBHOOK_PATH: &str = "/webhook";

/// A custom error describing the error cases for the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener cannot be bound to the address.
    #[error("cannot start server on {0}: {1}")]
    BindFailed(String, String),
    /// Reading the request or writing the response failed.
    #[error("cannot respond: {0}")]
    ConnectionFailed(#[from] std::io::Error),
}

/// A minimal HTTP 1.1 server, that handles webhook deliveries.
///
/// Every request runs on its own thread, so a slow clone doesn't block
/// deliveries for other repositories.
pub struct WebhookServer {
    server: Arc<Server>,
}

impl WebhookServer {
    /// Bind to an address, for example "0.0.0.0:8000".
    pub fn bind(address: &str) -> Result<Self, ServerError> {
        let server = Server::http(address)
            .map_err(|err| ServerError::BindFailed(address.to_string(), err.to_string()))?;

        Ok(WebhookServer {
            server: Arc::new(server),
        })
    }

    /// The bound address, useful if it was bound to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// A handle that can stop the server from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.server))
    }

    /// Accept requests until the server is stopped, then wait for the running requests.
    pub fn listen(&self, handler: Arc<WebhookHandler>) {
        match self.local_addr() {
            Some(addr) => info!("Listening on {addr}..."),
            None => info!("Listening..."),
        }

        let mut workers: Vec<JoinHandle<()>> = vec![];
        for request in self.server.incoming_requests() {
            let handler = Arc::clone(&handler);
            workers.retain(|worker| !worker.is_finished());
            workers.push(thread::spawn(move || {
                if let Err(err) = respond(&handler, request) {
                    error!("Request failed: {err}.");
                }
            }));
        }

        debug!("Waiting for {} running requests.", workers.len());
        for worker in workers {
            if worker.join().is_err() {
                error!("A request handler panicked.");
            }
        }
        info!("Server stopped.");
    }
}

/// Stops the accept loop of a [WebhookServer].
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Server>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.unblock();
    }
}

/// Route the request and answer it.
fn route(handler: &WebhookHandler, method: &Method, url: &str, body: &[u8]) -> WebhookResponse {
    let path = url.split_once('?').map_or(url, |(path, _)| path);

    match (method, path) {
        (Method::Post, WEBHOOK_PATH) => handler.handle(body),
        (_, WEBHOOK_PATH) => WebhookResponse {
            status: 405,
            body: String::from("Method not allowed"),
        },
        _ => WebhookResponse {
            status: 404,
            body: String::from("Not found"),
        },
    }
}

fn respond(handler: &WebhookHandler, mut request: Request) -> Result<(), ServerError> {
    debug!("Received request on {} {}.", request.method(), request.url());

    // Invalid UTF-8 is answered as an invalid payload, so read bytes
    let mut body = Vec::new();
    request.as_reader().read_to_end(&mut body)?;

    let response = route(handler, request.method(), request.url(), &body);
    info!(
        "{} {} responded with {}.",
        request.method(),
        request.url(),
        response.status
    );

    request.respond(Response::from_string(response.body).with_status_code(response.status))?;

    Ok(())
}
