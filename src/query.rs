//! Finger query line parser.
//!
//! RFC 1288 gives the query grammar as:
//!
//! ```text
//! {Q1}    ::= [{W}|{W}{S}{U}]{C}
//! {Q2}    ::= [{W}{S}][{U}]{H}{C}
//! {U}     ::= username
//! {H}     ::= @hostname | @hostname{H}
//! {W}     ::= /W
//! {S}     ::= <SP> | <SP>{S}
//! {C}     ::= <CRLF>
//! ```
//!
//! Servers are expected to be lenient, so parsing never fails: the longest
//! `[whitespace][username](@host)*` prefix of the line is taken and the rest
//! is ignored.
//!
//! ```text
//! ""              -> username "",    hosts []
//! "foo"           -> username "foo", hosts []
//! "foo@jump@host" -> username "foo", hosts ["jump", "host"]
//! "@host"         -> username "",    hosts ["host"]
//! ```

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// A parsed finger request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Username, may be empty (list all users).
    pub username: String,
    /// Relay chain, leftmost host first.
    pub hosts: Vec<String>,
    /// Peer address, stamped by the server. Never set by the parser.
    pub remote_addr: Option<SocketAddr>,
}

impl Query {
    /// Create a query for a local user.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Append relay hosts to the chain.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts.extend(hosts.into_iter().map(Into::into));
        self
    }

    /// True when the query asks to be forwarded through other hosts.
    pub fn is_relay(&self) -> bool {
        !self.hosts.is_empty()
    }

    /// Wire form of the query, terminated with CRLF.
    pub fn to_line(&self) -> String {
        format!("{self}\r\n")
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)?;
        for host in &self.hosts {
            write!(f, "@{host}")?;
        }
        Ok(())
    }
}

impl FromStr for Query {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse(s))
    }
}

/// Parse one query line. The line terminator is optional.
pub fn parse(line: &str) -> Query {
    let input = line.as_bytes();

    let start = skip_whitespace(input);
    let user_end = start + word_len(&input[start..]);
    let username = line[start..user_end].to_string();

    let chain_end = user_end + host_chain_len(&input[user_end..]);
    let hosts = if chain_end > user_end {
        // Leading '@' yields an empty first segment
        line[user_end..chain_end]
            .split('@')
            .skip(1)
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    Query {
        username,
        hosts,
        remote_addr: None,
    }
}

/// Bytes of leading whitespace: SP, HT, CR, LF, FF.
fn skip_whitespace(input: &[u8]) -> usize {
    input
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0c))
        .count()
}

/// Length of the run of `[A-Za-z0-9_-]` at the start of `input`.
fn word_len(input: &[u8]) -> usize {
    input.iter().take_while(|&&b| is_word(b)).count()
}

/// Length of the longest `(@word)+` run at the start of `input`, or 0.
fn host_chain_len(input: &[u8]) -> usize {
    let mut pos = 0;
    while input.get(pos) == Some(&b'@') {
        let host = word_len(&input[pos + 1..]);
        if host == 0 {
            break;
        }
        pos += 1 + host;
    }
    pos
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_canonical() {
        let cases: &[(&str, &str, &[&str])] = &[
            ("", "", &[]),
            ("foo", "foo", &[]),
            ("foo@host", "foo", &["host"]),
            ("foo@jump@host", "foo", &["jump", "host"]),
            ("@host", "", &["host"]),
            ("foo@host\n", "foo", &["host"]),
        ];

        for (input, username, expected) in cases {
            let query = parse(input);
            assert_eq!(query.username, *username, "input {:?}", input);
            assert_eq!(query.hosts, hosts(expected), "input {:?}", input);
            assert_eq!(query.remote_addr, None);
        }
    }

    #[test]
    fn test_parse_crlf() {
        assert_eq!(parse("alice\r\n"), Query::new("alice"));
        assert_eq!(parse("\r\n"), Query::default());
        assert_eq!(parse("\n"), Query::default());
    }

    #[test]
    fn test_parse_leading_whitespace() {
        assert_eq!(parse("   alice"), Query::new("alice"));
        assert_eq!(parse("\t bob@remote\r\n").hosts, hosts(&["remote"]));
    }

    #[test]
    fn test_parse_verbose_switch_is_ignored() {
        // "/W" is not a word character, so nothing matches past it
        assert_eq!(parse("/W alice"), Query::default());
    }

    #[test]
    fn test_parse_many_hops() {
        for n in 0..8 {
            let hops: Vec<String> = (0..n).map(|i| format!("host{i}")).collect();
            let mut line = String::from("user");
            for hop in &hops {
                line.push('@');
                line.push_str(hop);
            }
            let query = parse(&line);
            assert_eq!(query.username, "user");
            assert_eq!(query.hosts, hops);
        }
    }

    #[test]
    fn test_parse_tolerates_junk() {
        assert_eq!(parse("   "), Query::default());
        assert_eq!(parse("@"), Query::default());
        assert_eq!(parse("@@host"), Query::default());
        assert_eq!(parse("foo@"), Query::new("foo"));
        assert_eq!(parse("foo@host@"), Query::new("foo").with_hosts(["host"]));
        assert_eq!(parse("foo bar"), Query::new("foo"));
        assert_eq!(parse("!!!"), Query::default());
        assert_eq!(parse("héllo"), Query::new("h"));
    }

    #[test]
    fn test_parse_hyphen_and_underscore() {
        let query = parse("first_last@my-host@other_host");
        assert_eq!(query.username, "first_last");
        assert_eq!(query.hosts, hosts(&["my-host", "other_host"]));
    }

    #[test]
    fn test_from_str() {
        let query: Query = "foo@jump@host".parse().unwrap();
        assert_eq!(query, Query::new("foo").with_hosts(["jump", "host"]));
    }

    #[test]
    fn test_display() {
        let query = Query::new("foo").with_hosts(["jump", "host"]);
        assert_eq!(query.to_string(), "foo@jump@host");
        assert_eq!(query.to_line(), "foo@jump@host\r\n");
        assert_eq!(parse(&query.to_line()), query);

        assert_eq!(Query::default().to_line(), "\r\n");
        assert!(query.is_relay());
        assert!(!Query::new("foo").is_relay());
    }
}
