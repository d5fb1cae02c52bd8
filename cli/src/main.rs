use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, DrawPoint, Point, ServerMessage, StrokeStyle, Tool};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// How long `undo`/`redo` wait for the room's echo before assuming there was
/// nothing to do.
const ECHO_WAIT: Duration = Duration::from_millis(750);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out after {0:?} waiting for the room to admit us")]
    JoinTimeout(Duration),
    #[error("timed out after {0:?} waiting for `{1}`")]
    Timeout(Duration, String),
    #[error("server returned {code}: {message}")]
    Server { code: String, message: String },
    #[error("invalid server message: {0}")]
    Decode(#[from] protocol::ParseError),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid point `{0}`; expected x,y")]
    InvalidPoint(String),
    #[error("a stroke needs at least one point")]
    NoPoints,
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "sketch-cli", about = "Join a sketchroom and draw from the terminal")]
struct Cli {
    #[arg(long, env = "SKETCH_URL", default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    #[arg(long, env = "SKETCH_ROOM", default_value = protocol::DEFAULT_ROOM_KEY)]
    room: String,

    #[arg(long, env = "SKETCH_NAME")]
    name: Option<String>,

    #[arg(long, default_value_t = 5000)]
    join_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every room message as a JSON line until the server closes.
    Watch,
    /// Draw one stroke through the given points.
    Stroke(StrokeArgs),
    Undo,
    Redo,
    Clear,
}

#[derive(Args, Debug)]
struct StrokeArgs {
    /// Space-separated `x,y` pairs, e.g. "0,0 10,10 20,5".
    #[arg(long)]
    points: String,

    #[arg(long, value_enum, default_value_t = ToolArg::Brush)]
    tool: ToolArg,

    #[arg(long, default_value = "#000000")]
    color: String,

    #[arg(long, default_value_t = 3.0)]
    width: f64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ToolArg {
    Brush,
    Eraser,
}

impl From<ToolArg> for Tool {
    fn from(tool: ToolArg) -> Self {
        match tool {
            ToolArg::Brush => Tool::Brush,
            ToolArg::Eraser => Tool::Eraser,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.join_timeout_ms);

    let (mut stream, welcome) = connect_and_join(&cli.url, &cli.room, cli.name.as_deref(), timeout).await?;

    match cli.command {
        Command::Watch => {
            print_message(&welcome)?;
            watch(&mut stream).await?;
        }
        Command::Stroke(args) => {
            let points = parse_points(&args.points)?;
            let style = StrokeStyle { tool: args.tool.into(), color: args.color, width: args.width };
            for message in gesture(&points, &style)? {
                send(&mut stream, &message).await?;
            }
            let ack = wait_for(&mut stream, "stroke-committed", timeout).await?;
            if let ServerMessage::StrokeCommitted { operation_id } = ack {
                eprintln!("stroke committed as operation {operation_id}: {} point(s) in room {}", points.len(), cli.room);
            }
        }
        Command::Undo => history_command(&mut stream, &ClientMessage::Undo).await?,
        Command::Redo => history_command(&mut stream, &ClientMessage::Redo).await?,
        Command::Clear => {
            send(&mut stream, &ClientMessage::Clear).await?;
            wait_for(&mut stream, "clear", timeout).await?;
            eprintln!("room {} cleared", cli.room);
        }
    }

    stream.close(None).await?;
    Ok(())
}

// =============================================================================
// SESSION
// =============================================================================

async fn connect_and_join(
    url: &str,
    room: &str,
    name: Option<&str>,
    timeout: Duration,
) -> Result<(Socket, ServerMessage), CliError> {
    let (mut stream, _) = connect_async(url).await?;
    let join = ClientMessage::Join { room_key: Some(room.to_owned()), display_name: name.map(str::to_owned) };
    send(&mut stream, &join).await?;

    let welcome = tokio::time::timeout(timeout, async {
        loop {
            let message = recv_message(&mut stream).await?;
            if matches!(message, ServerMessage::Joined { .. }) {
                return Ok::<_, CliError>(message);
            }
        }
    })
    .await
    .map_err(|_| CliError::JoinTimeout(timeout))??;
    Ok((stream, welcome))
}

async fn watch(stream: &mut Socket) -> Result<(), CliError> {
    loop {
        match recv_message(stream).await {
            Ok(message) => print_message(&message)?,
            Err(CliError::WsClosed) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

/// Undo and redo are silent when there is nothing to do, so a missing echo
/// is not an error.
async fn history_command(stream: &mut Socket, command: &ClientMessage) -> Result<(), CliError> {
    send(stream, command).await?;
    match wait_for(stream, command.kind(), ECHO_WAIT).await {
        Ok(message) => {
            let index = match &message {
                ServerMessage::Undo(state) | ServerMessage::Redo(state) => state.current_index,
                _ => -1,
            };
            eprintln!("{}: current index {index}", command.kind());
            Ok(())
        }
        Err(CliError::Timeout(..)) => {
            eprintln!("{}: nothing to do", command.kind());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Wait for the next message of `kind`. A server `error` ends the wait.
async fn wait_for(stream: &mut Socket, kind: &str, timeout: Duration) -> Result<ServerMessage, CliError> {
    tokio::time::timeout(timeout, async {
        loop {
            let message = recv_message(stream).await?;
            if message.kind() == kind {
                return Ok::<_, CliError>(message);
            }
        }
    })
    .await
    .map_err(|_| CliError::Timeout(timeout, kind.to_owned()))?
}

// =============================================================================
// TRANSPORT
// =============================================================================

async fn send(stream: &mut Socket, message: &ClientMessage) -> Result<(), CliError> {
    let text = protocol::encode(message)?;
    stream.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Next decodable server message. Server `error` messages become `CliError::Server`.
async fn recv_message(stream: &mut Socket) -> Result<ServerMessage, CliError> {
    loop {
        let Some(message) = stream.next().await else {
            return Err(CliError::WsClosed);
        };
        let text = match message? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(CliError::WsClosed),
            _ => continue,
        };
        match protocol::parse_server_message(text.as_str())? {
            ServerMessage::Error { code, message } => return Err(CliError::Server { code, message }),
            other => return Ok(other),
        }
    }
}

fn print_message(message: &ServerMessage) -> Result<(), CliError> {
    println!("{}", protocol::encode(message)?);
    Ok(())
}

// =============================================================================
// STROKES
// =============================================================================

fn parse_points(input: &str) -> Result<Vec<Point>, CliError> {
    input
        .split_whitespace()
        .map(|pair| {
            let invalid = || CliError::InvalidPoint(pair.to_owned());
            let (x, y) = pair.split_once(',').ok_or_else(invalid)?;
            let x: f64 = x.trim().parse().map_err(|_| invalid())?;
            let y: f64 = y.trim().parse().map_err(|_| invalid())?;
            if !x.is_finite() || !y.is_finite() {
                return Err(invalid());
            }
            Ok(Point::new(x, y))
        })
        .collect()
}

/// The begin/continue/finish sequence for one stroke. A single point begins
/// and finishes at the same place.
fn gesture(points: &[Point], style: &StrokeStyle) -> Result<Vec<ClientMessage>, CliError> {
    let (first, rest) = points.split_first().ok_or(CliError::NoPoints)?;
    let mut messages = vec![ClientMessage::DrawBegin(DrawPoint::new(*first, style))];
    match rest.split_last() {
        Some((last, middle)) => {
            messages.extend(middle.iter().map(|p| ClientMessage::DrawContinue(DrawPoint::new(*p, style))));
            messages.push(ClientMessage::DrawFinish(DrawPoint::new(*last, style)));
        }
        None => messages.push(ClientMessage::DrawFinish(DrawPoint::new(*first, style))),
    }
    Ok(messages)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
