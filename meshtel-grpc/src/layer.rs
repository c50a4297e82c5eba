use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use http::{HeaderValue, Request, Response};
use http_body::{Body, Frame, SizeHint};
use meshtel_core::codec;
use meshtel_core::{
    ActivationContext, LabelBundle, MetricName, MetricRecord, MetricValue, Observability,
    ObservabilityError, RawLabels, RecordSink, METHOD_LABEL, PEER_METADATA_HEADER, STATUS_LABEL,
};
use pin_project_lite::pin_project;
use tonic::Code;
use tower::{Layer, Service};

use crate::metadata::{peer_labels_from_headers, status_from_headers, status_label};

/// Server-side tower layer for the peer label exchange.
///
/// For every call it records `grpc.server.call.started`, answers the
/// client's exchange header with the server's own bundle (only when the
/// client sent one), and records `grpc.server.call.duration` with the
/// client's labels once the response stream ends.
#[derive(Clone)]
pub struct PeerExchangeLayer {
    sink: RecordSink,
    echo: Option<HeaderValue>,
    xds_enabled: bool,
}

impl PeerExchangeLayer {
    pub fn new(sink: RecordSink, exchange: &LabelBundle, xds_enabled: bool) -> Self {
        let echo = if exchange.is_empty() {
            None
        } else {
            HeaderValue::from_str(&codec::to_header_value(exchange)).ok()
        };
        Self {
            sink,
            echo,
            xds_enabled,
        }
    }

    /// Layer for a running session. Fails with
    /// [`ObservabilityError::NotStarted`] if `observability` is not running.
    pub fn from_observability(
        observability: &Observability,
        xds_enabled: bool,
    ) -> Result<Self, ObservabilityError> {
        let sink = observability
            .sink()
            .cloned()
            .ok_or(ObservabilityError::NotStarted)?;
        let exchange = observability.server_exchange_labels(xds_enabled);
        Ok(Self::new(sink, &exchange, xds_enabled))
    }
}

impl<S> Layer<S> for PeerExchangeLayer {
    type Service = PeerExchangeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PeerExchangeService {
            inner,
            sink: self.sink.clone(),
            echo: self.echo.clone(),
            xds_enabled: self.xds_enabled,
        }
    }
}

#[derive(Clone)]
pub struct PeerExchangeService<S> {
    inner: S,
    sink: RecordSink,
    echo: Option<HeaderValue>,
    xds_enabled: bool,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for PeerExchangeService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = Response<ExchangeBody<ResBody>>;
    type Error = S::Error;
    type Future = PeerExchangeFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.uri().path().trim_start_matches('/').to_string();
        let peer = peer_labels_from_headers(req.headers());
        let echo = if peer.is_empty() {
            None
        } else {
            self.echo.clone()
        };
        let context = ActivationContext::server(self.xds_enabled);

        self.sink.submit(
            MetricRecord::new(MetricName::ServerCallStarted, MetricValue::Int(1))
                .label(METHOD_LABEL, method.clone())
                .context(context.clone()),
        );

        PeerExchangeFuture {
            inner: self.inner.call(req),
            echo,
            call: Some(CallRecorder {
                sink: self.sink.clone(),
                method,
                peer,
                context,
                start: Instant::now(),
                status: None,
                finished: false,
            }),
        }
    }
}

pin_project! {
    /// Future adding the exchange header to the response and handing the
    /// call's recorder over to the response body.
    pub struct PeerExchangeFuture<F> {
        #[pin]
        inner: F,
        echo: Option<HeaderValue>,
        call: Option<CallRecorder>,
    }
}

impl<F, ResBody, E> Future for PeerExchangeFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ExchangeBody<ResBody>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));
        let mut call = this.call.take();

        match result {
            Ok(mut response) => {
                if let Some(echo) = this.echo.take() {
                    response.headers_mut().insert(PEER_METADATA_HEADER, echo);
                }
                // Trailers-only responses carry the status in the headers.
                if let (Some(call), Some(code)) =
                    (call.as_mut(), status_from_headers(response.headers()))
                {
                    call.status = Some(code);
                }
                Poll::Ready(Ok(response.map(|inner| ExchangeBody { inner, call })))
            }
            Err(e) => {
                if let Some(call) = call.as_mut() {
                    call.complete(Code::Unknown);
                }
                Poll::Ready(Err(e))
            }
        }
    }
}

pin_project! {
    /// Response body that records the call duration when the stream ends.
    pub struct ExchangeBody<B> {
        #[pin]
        inner: B,
        call: Option<CallRecorder>,
    }
}

impl<B: Body> Body for ExchangeBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let polled = ready!(this.inner.poll_frame(cx));
        if let Some(call) = this.call.as_mut() {
            match &polled {
                Some(Ok(frame)) => {
                    if let Some(trailers) = frame.trailers_ref() {
                        if let Some(code) = status_from_headers(trailers) {
                            call.status = Some(code);
                        }
                        call.complete(Code::Ok);
                    }
                }
                Some(Err(_)) => call.complete(Code::Unknown),
                None => call.complete(Code::Ok),
            }
        }
        Poll::Ready(polled)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Records `grpc.server.call.duration` exactly once: when the stream
/// completes, or with `CANCELLED` when dropped before that.
struct CallRecorder {
    sink: RecordSink,
    method: String,
    peer: RawLabels,
    context: ActivationContext,
    start: Instant,
    status: Option<Code>,
    finished: bool,
}

impl CallRecorder {
    fn complete(&mut self, default: Code) {
        if self.finished {
            return;
        }
        self.finished = true;
        let code = self.status.unwrap_or(default);
        let record = MetricRecord::new(
            MetricName::ServerCallDuration,
            MetricValue::Double(self.start.elapsed().as_secs_f64()),
        )
        .label(METHOD_LABEL, std::mem::take(&mut self.method))
        .label(STATUS_LABEL, status_label(code))
        .labels(std::mem::take(&mut self.peer))
        .context(self.context.clone());
        self.sink.submit(record);
    }
}

impl Drop for CallRecorder {
    fn drop(&mut self) {
        self.complete(Code::Cancelled);
    }
}
