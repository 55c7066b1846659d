//! Minimal Twitch IRC client: tag-capable login, channel join, and
//! PRIVMSG reads with automatic PING handling. Only the read path is
//! implemented; the detector never speaks.

use crate::clock::{Clock, SystemClock};
use crate::error::SourceError;
use crate::source::ChatSource;
use crate::types::ChatMessage;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_HOST: &str = "irc.chat.twitch.tv";
pub const DEFAULT_PORT: u16 = 6667;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CAP_TIMEOUT: Duration = Duration::from_secs(5);
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const READ_CHUNK: usize = 4096;

pub struct TwitchIrc {
    stream: TcpStream,
    pending: String,
    clock: Arc<dyn Clock>,
}

impl TwitchIrc {
    pub fn connect(host: &str, port: u16) -> Result<Self, SourceError> {
        Self::connect_with_clock(host, port, Arc::new(SystemClock))
    }

    pub fn connect_with_clock(
        host: &str,
        port: u16,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SourceError> {
        let stream = connect_any(host, port)?;
        stream.set_nodelay(true).ok();
        tracing::info!(host, port, "connected to IRC server");
        Ok(Self {
            stream,
            pending: String::new(),
            clock,
        })
    }

    /// Tag-capable authenticated login. The oauth token may be passed
    /// with or without its `oauth:` prefix.
    pub fn authenticate(&mut self, oauth: &str, username: &str) -> Result<(), SourceError> {
        self.request_capabilities()?;

        let pass = if oauth.starts_with("oauth:") {
            oauth.to_string()
        } else {
            format!("oauth:{oauth}")
        };
        self.send_command(&format!("PASS {pass}"))?;
        self.send_command(&format!("NICK {}", username.to_ascii_lowercase()))?;

        if !self.wait_for("001", AUTH_TIMEOUT)? {
            return Err(SourceError::AuthFailed("no welcome from server".into()));
        }
        tracing::info!(username, "authenticated");
        Ok(())
    }

    /// Read-only login with Twitch's anonymous nick family.
    pub fn authenticate_anonymous(&mut self) -> Result<(), SourceError> {
        self.request_capabilities()?;

        let nick = format!("justinfan{}", std::process::id());
        self.send_command(&format!("NICK {nick}"))?;

        if !self.wait_for("001", AUTH_TIMEOUT)? {
            return Err(SourceError::AuthFailed("no welcome from server".into()));
        }
        tracing::info!(%nick, "authenticated anonymously");
        Ok(())
    }

    pub fn join(&mut self, channel: &str) -> Result<(), SourceError> {
        let channel = if channel.starts_with('#') {
            channel.to_string()
        } else {
            format!("#{channel}")
        };
        self.send_command(&format!("JOIN {channel}"))?;
        if !self.wait_for("JOIN", JOIN_TIMEOUT)? {
            return Err(SourceError::JoinFailed(channel));
        }
        tracing::info!(%channel, "joined");
        Ok(())
    }

    /// Next PRIVMSG within `timeout`; `Ok(None)` when the window elapses
    /// with no chat traffic. PINGs are answered transparently.
    pub fn read_message(&mut self, timeout: Duration) -> Result<Option<ChatMessage>, SourceError> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let line = match self.receive_line(deadline - now)? {
                Some(line) => line,
                None => return Ok(None),
            };

            if let Some(payload) = line.strip_prefix("PING") {
                self.send_command(&format!("PONG{payload}"))?;
                continue;
            }

            if line.contains("PRIVMSG") {
                if let Some(message) = parse_privmsg(&line, self.clock.now_ms()) {
                    return Ok(Some(message));
                }
            }
        }
    }

    pub fn send_raw(&mut self, message: &str) -> Result<(), SourceError> {
        self.send_command(message)
    }

    fn request_capabilities(&mut self) -> Result<(), SourceError> {
        self.send_command("CAP REQ :twitch.tv/tags twitch.tv/commands")?;
        if !self.wait_for("ACK", CAP_TIMEOUT)? {
            return Err(SourceError::AuthFailed(
                "capability negotiation timed out".into(),
            ));
        }
        Ok(())
    }

    fn send_command(&mut self, command: &str) -> Result<(), SourceError> {
        self.stream.write_all(command.as_bytes())?;
        self.stream.write_all(b"\r\n")?;
        Ok(())
    }

    /// One `\r\n`-terminated line, reassembled across reads. `Ok(None)`
    /// on timeout.
    fn receive_line(&mut self, timeout: Duration) -> Result<Option<String>, SourceError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = self.pending.find("\r\n") {
                let line = self.pending[..pos].to_string();
                self.pending.drain(..pos + 2);
                return Ok(Some(line));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.stream.set_read_timeout(Some(deadline - now))?;

            let mut chunk = [0u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(SourceError::Disconnected),
                Ok(read) => self
                    .pending
                    .push_str(&String::from_utf8_lossy(&chunk[..read])),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(err) => return Err(SourceError::Io(err)),
            }
        }
    }

    fn wait_for(&mut self, expected: &str, timeout: Duration) -> Result<bool, SourceError> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            let line = match self.receive_line(deadline - now)? {
                Some(line) => line,
                None => return Ok(false),
            };
            if line.contains("Login authentication failed") {
                return Err(SourceError::AuthFailed("login rejected by server".into()));
            }
            if line.contains(expected) {
                return Ok(true);
            }
        }
    }
}

fn connect_any(host: &str, port: u16) -> Result<TcpStream, SourceError> {
    let mut last_error: Option<std::io::Error> = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }
    Err(SourceError::Io(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            ErrorKind::NotFound,
            format!("no addresses resolved for {host}:{port}"),
        )
    })))
}

/// Parse a PRIVMSG line into a chat message.
///
/// `@tags :nick!user@host PRIVMSG #channel :text` — the timestamp comes
/// from the `tmi-sent-ts` tag when present, otherwise `fallback_ts_ms`;
/// the username from the `display-name` tag, falling back to the prefix
/// nick. Lines without a recognizable shape yield `None`.
fn parse_privmsg(line: &str, fallback_ts_ms: i64) -> Option<ChatMessage> {
    let (tags, rest) = match line.strip_prefix('@') {
        Some(stripped) => {
            let (tags, rest) = stripped.split_once(' ')?;
            (Some(tags), rest)
        }
        None => (None, line),
    };

    let privmsg_at = rest.find("PRIVMSG")?;
    let (prefix, after) = rest.split_at(privmsg_at);
    let content = after
        .split_once(" :")
        .map(|(_, text)| text)
        .unwrap_or_default();

    let timestamp_ms = tags
        .and_then(|tags| tag_value(tags, "tmi-sent-ts"))
        .and_then(|value| value.parse::<i64>().ok())
        .filter(|ts| *ts > 0)
        .unwrap_or(fallback_ts_ms);

    let username = tags
        .and_then(|tags| tag_value(tags, "display-name"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| nick_from_prefix(prefix))?;

    Some(ChatMessage {
        timestamp_ms,
        username,
        content: content.to_string(),
    })
}

fn tag_value<'a>(tags: &'a str, key: &str) -> Option<&'a str> {
    tags.split(';').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then_some(value)
    })
}

fn nick_from_prefix(prefix: &str) -> Option<String> {
    let source = prefix.trim().strip_prefix(':')?;
    let nick = source.split('!').next()?;
    if nick.is_empty() {
        None
    } else {
        Some(nick.to_string())
    }
}

/// `ChatSource` adapter over a joined connection. A quiet period longer
/// than `read_timeout` ends the stream.
pub struct IrcSource {
    irc: TwitchIrc,
    read_timeout: Duration,
}

impl IrcSource {
    pub fn new(irc: TwitchIrc, read_timeout: Duration) -> Self {
        Self { irc, read_timeout }
    }
}

impl ChatSource for IrcSource {
    fn next_message(&mut self) -> Result<Option<ChatMessage>, SourceError> {
        self.irc.read_message(self.read_timeout)
    }
}
