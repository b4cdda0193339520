//! Lifecycle of one accepted connection.
//!
//! A connection runs request/response cycles back to back until the peer
//! hangs up, a read goes idle for longer than the configured timeout, or an
//! error forces it closed:
//!
//! ```text
//! AwaitRequestLine -> ReadHeaders -> ReadBody -> Dispatch -> WriteResponse
//!        ^                                                        |
//!        +------------------------ keep-alive --------------------+
//! ```
//!
//! Requests are never pipelined: the next request line is read only after
//! the previous response has been written.

use std::future::Future;
use std::net::{Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_std::future;
use async_std::io::BufReader;
use async_std::net::TcpStream;
use async_std::prelude::*;
use async_std::task;

use crate::handler::DispatchError;
use crate::handler::responses::ErrorResponse;
use crate::http::headers::HttpHeaders;
use crate::http::parser::{self, ParseError};
use crate::http::request::{HttpRequest, RequestLine};
use crate::http::response::HttpResponse;
use crate::http::status::HttpStatus;
use crate::net::rate_limit::RateLimitExceeded;
use crate::net::server::Shared;

/// How long a closing connection keeps draining input so the peer can read
/// the final response before the socket goes away.
const LINGER: Duration = Duration::from_millis(100);

enum State {
    AwaitRequestLine,
    ReadHeaders(RequestLine),
    ReadBody(RequestLine, HttpHeaders),
    Dispatch(HttpRequest),
    WriteResponse { response: HttpResponse, close: bool },
    Close,
}

pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,

    /// Bytes read for the request in progress.
    consumed: usize,
    requests: u64,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>) -> Self {
        Self {
            reader: BufReader::new(stream.clone()),
            writer: stream,
            peer,
            shared,
            consumed: 0,
            requests: 0,
        }
    }

    pub async fn run(mut self) {
        log::debug!("{}: connection opened", self.peer);

        let mut state = State::AwaitRequestLine;
        loop {
            state = match state {
                State::AwaitRequestLine => self.await_request_line().await,
                State::ReadHeaders(line) => self.read_headers(line).await,
                State::ReadBody(line, headers) => self.read_body(line, headers).await,
                State::Dispatch(req) => self.dispatch(req).await,
                State::WriteResponse { response, close } => {
                    self.write_response(response, close).await
                }
                State::Close => break,
            };
        }

        self.close().await;
        log::debug!("{}: connection closed after {} requests", self.peer, self.requests);
    }

    async fn await_request_line(&mut self) -> State {
        self.consumed = 0;

        if self.requests == 0 {
            if let Err(err) = self.shared.limiter.check_only(self.peer.ip()) {
                return self.reject(err);
            }
        }

        let timeout = self.shared.config.request_timeout;
        let max = self.shared.config.max_request_bytes;
        let read = with_timeout(
            timeout,
            parser::read_line(&mut self.reader, &mut self.consumed, max),
        )
        .await;
        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => return State::Close,
            Err(err) => return self.fail(err),
        };

        self.requests += 1;
        if let Err(err) = self.shared.limiter.check_and_increment(self.peer.ip()) {
            return self.reject(err);
        }

        match parser::parse_request_line(&line) {
            Ok(line) => State::ReadHeaders(line),
            Err(err) => self.fail(err),
        }
    }

    async fn read_headers(&mut self, line: RequestLine) -> State {
        let timeout = self.shared.config.request_timeout;
        let max = self.shared.config.max_request_bytes;

        let read = with_timeout(
            timeout,
            parser::read_headers(&mut self.reader, &mut self.consumed, max),
        )
        .await;
        match read {
            Ok(headers) => State::ReadBody(line, headers),
            Err(err) => self.fail(err),
        }
    }

    async fn read_body(&mut self, line: RequestLine, headers: HttpHeaders) -> State {
        let timeout = self.shared.config.request_timeout;
        let max = self.shared.config.max_request_bytes;

        let read = with_timeout(
            timeout,
            parser::read_body(&mut self.reader, &headers, &mut self.consumed, max),
        )
        .await;
        match read {
            Ok(body) => State::Dispatch(HttpRequest::new(line, headers, body)),
            Err(err) => self.fail(err),
        }
    }

    async fn dispatch(&mut self, req: HttpRequest) -> State {
        let content_type = &self.shared.config.content_type;
        let handler_timeout = self.shared.config.handler_timeout;
        let method = req.method;
        log::debug!("{}: {} {}", self.peer, req.method, req.path);

        // Handlers are plain blocking functions; keep them off the I/O executor.
        // On timeout the handler keeps running to completion, detached.
        let dispatcher = Arc::clone(&self.shared.dispatcher);
        let job = task::spawn_blocking(move || dispatcher.dispatch(&req));
        let result = future::timeout(handler_timeout, job)
            .await
            .unwrap_or(Err(DispatchError::TimedOut(handler_timeout)));

        match result {
            Ok(body) => State::WriteResponse {
                response: HttpResponse::new(method.success_status(), content_type, body),
                close: false,
            },
            Err(err) => {
                log::warn!("{}: {err}", self.peer);
                State::WriteResponse {
                    response: ErrorResponse::from_error(err.into_http_status(), &err)
                        .into_response(content_type),
                    close: err.closes_connection(),
                }
            }
        }
    }

    async fn write_response(&mut self, response: HttpResponse, close: bool) -> State {
        if let Err(err) = self.writer.write_all(&response.to_bytes()).await {
            log::error!("{}: failed to write response: {err}", self.peer);
            return State::Close;
        }

        if close {
            State::Close
        } else {
            State::AwaitRequestLine
        }
    }

    /// Every parse failure ends the connection. I/O failures end it silently,
    /// the others get one error response first.
    fn fail(&self, err: ParseError) -> State {
        if let ParseError::Io(io) = &err {
            log::error!("{}: I/O error while reading request: {io}", self.peer);
            return State::Close;
        }

        log::warn!("{}: {err}", self.peer);
        State::WriteResponse {
            response: ErrorResponse::from_error(err.into_http_status(), &err)
                .into_response(&self.shared.config.content_type),
            close: true,
        }
    }

    fn reject(&self, err: RateLimitExceeded) -> State {
        log::warn!("{}: {err}", self.peer);
        State::WriteResponse {
            response: ErrorResponse::from_error(HttpStatus::TooManyRequests, &err)
                .into_response(&self.shared.config.content_type),
            close: true,
        }
    }

    async fn close(&mut self) {
        if self.writer.shutdown(Shutdown::Write).is_err() {
            return;
        }

        let mut sink = [0u8; 1024];
        let _ = future::timeout(LINGER, async {
            while let Ok(n) = self.reader.read(&mut sink).await {
                if n == 0 {
                    break;
                }
            }
        })
        .await;
    }
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, ParseError>
where
    F: Future<Output = Result<T, ParseError>>,
{
    future::timeout(timeout, fut)
        .await
        .unwrap_or(Err(ParseError::TimedOut))
}
