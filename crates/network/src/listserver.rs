//! # Listserver client
//!
//! The listserver speaks the generation-2 codec: the version packet goes
//! out raw, everything after is zlib-framed. One credential exchange
//! returns the server list plus status and URL lines, then the
//! connection is done.
//!
//! # Entry format
//!
//! The server list payload is a known-malformed concatenation: fields
//! run together with only a few reliable markers, `'<language>` after
//! the name and `!<players>[,]<host>%<port>` at the end of each entry.
//! Parsing is a regex scan over those markers, tolerant of everything
//! in between.

use bytes::BytesMut;
use flate2::read::ZlibDecoder;
use regex::Regex;
use reborn_config::ListServerConfig;
use reborn_core::{RebornError, Result};
use reborn_protocol::{compress, read_gchar, write_gchar, CompressionType};
use std::io::Read;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Listserver packet ids (client to server)
const PLI_SERVERLIST: u8 = 1;
const PLI_V2ENCRYPTKEYCL: u8 = 7;

/// Listserver packet ids (server to client)
const PLO_SVRLIST: u8 = 0;
const PLO_STATUS: u8 = 2;
const PLO_SITEURL: u8 = 3;
const PLO_ERROR: u8 = 4;
const PLO_UPGURL: u8 = 5;

/// One game server advertised by the listserver
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntry {
    pub name: String,
    pub server_type: String,
    pub language: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub players: u32,
    pub host: String,
    pub port: u16,
}

/// Status lines delivered alongside the list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListStatus {
    pub status: Option<String>,
    pub site_url: Option<String>,
    pub upgrade_url: Option<String>,
    pub error: Option<String>,
}

/// Fetch the server list with one credential exchange.
pub async fn fetch_server_list(
    config: &ListServerConfig,
    account: &str,
    password: &str,
) -> Result<(Vec<ServerEntry>, ListStatus)> {
    let mut socket = timeout(config.timeout, TcpStream::connect(config.address()))
        .await
        .map_err(|_| RebornError::Timeout(format!("connect to {}", config.address())))??;

    // Version packet, uncompressed
    let mut version = BytesMut::new();
    write_gchar(&mut version, PLI_V2ENCRYPTKEYCL)?;
    write_gchar(&mut version, 0)?;
    version.extend_from_slice(config.version_banner.as_bytes());
    version.extend_from_slice(config.client_variant.as_bytes());
    version.extend_from_slice(b"\n");
    send_framed(&mut socket, &version, false).await?;

    // Credentials, zlib
    let mut auth = BytesMut::new();
    write_gchar(&mut auth, PLI_SERVERLIST)?;
    write_gchar(&mut auth, account.len().min(223) as u8)?;
    auth.extend_from_slice(account.as_bytes());
    write_gchar(&mut auth, password.len().min(223) as u8)?;
    auth.extend_from_slice(password.as_bytes());
    auth.extend_from_slice(b"\n");
    send_framed(&mut socket, &auth, true).await?;

    let mut servers = Vec::new();
    let mut status = ListStatus::default();

    loop {
        let payload = match timeout(config.timeout, read_framed(&mut socket)).await {
            Ok(Ok(Some(payload))) => payload,
            Ok(Ok(None)) => break,
            Ok(Err(err)) => return Err(err),
            // The listserver never closes promptly; a timeout after the
            // list arrived is the normal exit.
            Err(_) if !servers.is_empty() || status.error.is_some() => break,
            Err(_) => return Err(RebornError::Timeout("listserver response".into())),
        };
        if payload.is_empty() {
            continue;
        }

        let id = payload[0].wrapping_sub(32);
        let mut body = BytesMut::from(&payload[1..]);
        match id {
            PLO_SVRLIST => {
                servers = parse_server_list(&body);
                tracing::info!(count = servers.len(), "received server list");
            }
            PLO_STATUS => status.status = Some(read_short_text(&mut body)?),
            PLO_SITEURL => status.site_url = Some(read_short_text(&mut body)?),
            PLO_UPGURL => status.upgrade_url = Some(read_short_text(&mut body)?),
            PLO_ERROR => {
                let error = read_short_text(&mut body)?;
                tracing::warn!(%error, "listserver error");
                status.error = Some(error);
                break;
            }
            other => tracing::debug!(id = other, "unknown listserver packet, skipping"),
        }

        if !servers.is_empty() && status.status.is_some() {
            break;
        }
    }

    Ok((servers, status))
}

async fn send_framed(socket: &mut TcpStream, payload: &[u8], compressed: bool) -> Result<()> {
    let body = if compressed {
        compress(payload, CompressionType::Zlib)?
    } else {
        payload.to_vec()
    };
    let mut wire = Vec::with_capacity(2 + body.len());
    wire.extend_from_slice(&(body.len() as u16).to_be_bytes());
    wire.extend_from_slice(&body);
    socket.write_all(&wire).await?;
    Ok(())
}

/// Read one frame; transparently inflates zlib payloads.
async fn read_framed(socket: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    let mut hdr = [0u8; 2];
    match socket.read_exact(&mut hdr).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u16::from_be_bytes(hdr) as usize;
    let mut payload = vec![0u8; len];
    let mut got = 0;
    while got < len {
        let n = socket.read(&mut payload[got..]).await?;
        if n == 0 {
            return Err(RebornError::TransportTruncated { expected: len, got });
        }
        got += n;
    }

    // zlib magic; some replies come back raw
    if payload.first() == Some(&0x78) {
        let mut decoder = ZlibDecoder::new(&payload[..]);
        let mut inflated = Vec::new();
        if decoder.read_to_end(&mut inflated).is_ok() {
            return Ok(Some(inflated));
        }
    }
    Ok(Some(payload))
}

fn read_short_text(body: &mut BytesMut) -> Result<String> {
    let len = read_gchar(body)? as usize;
    let len = len.min(body.len());
    let bytes = body.split_to(len);
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Split the concatenated list into entries by scanning for the
/// `!<players>[,]<host>%<port>` terminator of each one.
fn parse_server_list(data: &[u8]) -> Vec<ServerEntry> {
    let mut servers = Vec::new();
    if data.is_empty() {
        return servers;
    }

    let count = data[0].wrapping_sub(32) as usize;
    let text: String = data[1..].iter().map(|&b| b as char).collect();

    let terminator = Regex::new(r"!\d+[,.]?[A-Za-z0-9.\-]+%\d{4,5}").expect("static regex");
    let mut start = 0;
    for hit in terminator.find_iter(&text).take(count) {
        if let Some(server) = parse_single_server(&text[start..hit.end()]) {
            servers.push(server);
        }
        start = hit.end();
    }
    servers
}

/// Recover one entry's fields from its mangled chunk.
fn parse_single_server(chunk: &str) -> Option<ServerEntry> {
    // Language marker splits the name from the rest
    let mut name = String::new();
    let mut language = "English".to_string();
    for lang in ["'English", "'Finnish", "'Deutsch", "'Español", "'Français"] {
        if let Some(idx) = chunk.find(lang) {
            name = chunk[..idx].to_string();
            language = lang[1..].to_string();
            break;
        }
    }
    if name.is_empty() {
        name = chunk.split('\'').next().unwrap_or(chunk).to_string();
    }

    // Strip length-prefix garbage from the front of the name
    name = name
        .trim_start_matches(|c: char| (c as u32) < 32 || c == '(')
        .trim()
        .to_string();

    // A leading "<type> " letter marks premium/hosted flavors
    let mut server_type = String::new();
    if name.len() >= 2 && name.is_char_boundary(1) && name.is_char_boundary(2) && name.as_bytes()[1] == b' ' {
        server_type = name[..1].to_string();
        name = name[2..].to_string();
    }

    // Terminator: !<players>[,]<host>%<port>
    let tail = Regex::new(r"!(\d+)[,.]?([A-Za-z0-9.\-]+)%(\d{4,5})").expect("static regex");
    let caps = tail.captures(chunk)?;
    let players: u32 = caps[1].parse().ok()?;
    let host = caps[2].to_string();
    let port: u16 = caps[3].parse().ok()?;

    // URL and version are recovered by scan, wherever they landed
    let url = Regex::new(r"https?://[^\s,!%]+")
        .expect("static regex")
        .find(chunk)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let version = Regex::new(r"[Vv]ersion:?\s*([\d.]+)")
        .expect("static regex")
        .captures(chunk)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    // Description: whatever sits between the language marker and the
    // first recovered field
    let description = chunk
        .find(&language)
        .map(|idx| &chunk[idx + language.len()..])
        .and_then(|rest| {
            let end = rest
                .find("http")
                .or_else(|| rest.find('!'))
                .unwrap_or(rest.len());
            let desc = rest[..end].trim_matches(|c: char| (c as u32) < 32);
            Some(desc.trim().to_string())
        })
        .unwrap_or_default();

    Some(ServerEntry {
        name,
        server_type,
        language,
        description,
        url,
        version,
        players,
        host,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a payload the way the listserver mangles it: count byte,
    /// then entries with marker-separated fields run together.
    fn sample_payload() -> Vec<u8> {
        let mut data = vec![2 + 32];
        data.extend_from_slice(b"\x10Classic Reborn'EnglishThe original world.http://reborn.example/!12,play.reborn.example%14900");
        data.extend_from_slice(b"\x08P Zodiac'EnglishAdventure awaits3Version: 6.037!3.zodiac.example%14801");
        data
    }

    #[test]
    fn test_parse_server_list() {
        let servers = parse_server_list(&sample_payload());
        assert_eq!(servers.len(), 2);

        let first = &servers[0];
        assert_eq!(first.name, "Classic Reborn");
        assert_eq!(first.language, "English");
        assert_eq!(first.players, 12);
        assert_eq!(first.host, "play.reborn.example");
        assert_eq!(first.port, 14900);
        assert_eq!(first.url, "http://reborn.example/");

        let second = &servers[1];
        assert_eq!(second.name, "Zodiac");
        assert_eq!(second.server_type, "P");
        assert_eq!(second.players, 3);
        assert_eq!(second.host, "zodiac.example");
        assert_eq!(second.port, 14801);
        assert_eq!(second.version, "6.037");
    }

    #[test]
    fn test_parse_tolerates_garbage() {
        assert!(parse_server_list(&[]).is_empty());
        assert!(parse_server_list(b" no markers at all").is_empty());

        // Count claims more entries than terminators exist
        let mut data = vec![5 + 32];
        data.extend_from_slice(b"Lonely'EnglishOnly one!1,one.example%14900");
        let servers = parse_server_list(&data);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "Lonely");
    }

    #[test]
    fn test_single_server_without_language_marker() {
        let server = parse_single_server("Oddball'Klingon stuff!7,odd.example%14902").unwrap();
        assert_eq!(server.name, "Oddball");
        assert_eq!(server.language, "English"); // default
        assert_eq!(server.players, 7);
    }

    #[tokio::test]
    async fn test_fetch_against_loopback() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Version frame (raw)
            let mut hdr = [0u8; 2];
            socket.read_exact(&mut hdr).await.unwrap();
            let mut buf = vec![0u8; u16::from_be_bytes(hdr) as usize];
            socket.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf[0].wrapping_sub(32), PLI_V2ENCRYPTKEYCL);

            // Auth frame (zlib)
            socket.read_exact(&mut hdr).await.unwrap();
            let mut buf = vec![0u8; u16::from_be_bytes(hdr) as usize];
            socket.read_exact(&mut buf).await.unwrap();
            let mut decoder = ZlibDecoder::new(&buf[..]);
            let mut auth = Vec::new();
            decoder.read_to_end(&mut auth).unwrap();
            assert_eq!(auth[0].wrapping_sub(32), PLI_SERVERLIST);

            // Reply: server list then status, each its own frame
            let mut list = vec![PLO_SVRLIST + 32];
            list.extend_from_slice(&sample_payload());
            let mut wire = (list.len() as u16).to_be_bytes().to_vec();
            wire.extend_from_slice(&list);
            socket.write_all(&wire).await.unwrap();

            let mut status = vec![PLO_STATUS + 32];
            status.push(2 + 32);
            status.extend_from_slice(b"ok");
            let mut wire = (status.len() as u16).to_be_bytes().to_vec();
            wire.extend_from_slice(&status);
            socket.write_all(&wire).await.unwrap();
        });

        let config = ListServerConfig::new(addr.ip().to_string(), addr.port());
        let (servers, status) = fetch_server_list(&config, "account", "password")
            .await
            .unwrap();

        assert_eq!(servers.len(), 2);
        assert_eq!(status.status.as_deref(), Some("ok"));
        server.await.unwrap();
    }
}
