//! Line protocol server: decode, dispatch, encode, one invocation at a time.

use crate::error::Result;
use crate::function::{Context, GatewayHandler, Handler, HttpHandler};
use crate::runtime::protocol::{FrameDecoder, Input, Output};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// Serves a [`Handler`] over the host's line protocol.
///
/// Inputs are handled strictly in order and each output line is flushed
/// before the next input is read. The host never has more than one
/// invocation in flight per process, so nothing here runs concurrently.
pub struct LineServer<H> {
    handler: H,
}

impl<H: Handler> LineServer<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Serve stdin to stdout until the host closes stdin.
    pub async fn run(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve inputs from `reader`, writing outputs to `writer`.
    ///
    /// Returns `Ok(())` when the reader is exhausted. Malformed input is
    /// answered with one error line, after which the stream is abandoned and
    /// the decode error returned.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut decoder = FrameDecoder::new();
        let mut served: u64 = 0;

        info!("Serving line protocol");

        loop {
            let input = match decoder.next(&mut reader).await {
                Ok(Some(input)) => input,
                Ok(None) => {
                    info!("Input closed after {} invocations", served);
                    return Ok(());
                }
                Err(err) => {
                    error!("Abandoning input stream: {}", err);
                    write_output(&mut writer, &Output::error(err.to_string())).await?;
                    return Err(err);
                }
            };

            let output = self.dispatch(input).await;
            write_output(&mut writer, &output).await?;
            served += 1;
        }
    }

    async fn dispatch(&self, input: Input) -> Output {
        debug!(
            event = input.event.as_ref().map(|e| e.get()).unwrap_or("null"),
            "Decoded input"
        );

        let ctx = Context::new(input.event, input.context);
        match self.handler.handle_event(ctx).await {
            Ok(Some(value)) => Output::value(value),
            Ok(None) => Output::default(),
            Err(err) => {
                warn!("Handler failed: {}", err);
                Output::error(format!("failed to handle input: {}", err))
            }
        }
    }
}

/// Write one output line and flush it.
async fn write_output<W>(writer: &mut W, output: &Output) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = match output.to_line() {
        Ok(line) => line,
        Err(err) => {
            error!("{}", err);
            let line = Output::error(err.to_string()).to_line()?;
            writer.write_all(&line).await?;
            writer.flush().await?;
            return Err(err);
        }
    };

    debug!(output = %String::from_utf8_lossy(line.trim_ascii_end()), "Encoded output");
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Serve `handler` over the line protocol.
pub async fn serve<R, W, H>(reader: R, writer: W, handler: H) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: Handler,
{
    LineServer::new(handler).serve(reader, writer).await
}

/// Serve an HTTP handler through a gateway adapter without path stripping.
///
/// With `http` set to `None` every event is answered with a 404.
pub async fn serve_http<R, W>(
    reader: R,
    writer: W,
    http: Option<Arc<dyn HttpHandler>>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    serve(reader, writer, GatewayHandler::with_handler(0, http)).await
}
