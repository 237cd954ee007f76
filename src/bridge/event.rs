//! Line classification for the guest surface protocol.
//!
//! Each protocol line is a fixed tag followed by whitespace-separated
//! `key=value` tokens. Tokens without an `=` are skipped individually
//! and unrecognized keys are discarded here at the parse boundary. A
//! recognized tag missing a required key is still consumed as a
//! protocol line (and then ignored), never mistaken for noise or frame
//! content.

/// The fixed set of protocol tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolTag {
    Create,
    Configure,
    Destroy,
    Role,
    Focus,
    Parent,
    State,
    FrameBegin,
    FrameEnd,
}

impl ProtocolTag {
    fn from_token(tag: &str) -> Option<Self> {
        match tag {
            "CREATE" => Some(Self::Create),
            "CONFIGURE" => Some(Self::Configure),
            "DESTROY" => Some(Self::Destroy),
            "ROLE" => Some(Self::Role),
            "FOCUS" => Some(Self::Focus),
            "PARENT" => Some(Self::Parent),
            "STATE" => Some(Self::State),
            "FRAME_BEGIN" => Some(Self::FrameBegin),
            "FRAME_END" => Some(Self::FrameEnd),
            _ => None,
        }
    }
}

/// Classification of one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLine {
    /// A well-formed protocol line.
    Event(SurfaceEvent),
    /// A recognized tag whose required fields are missing or unusable.
    /// Consumed and ignored; never frame content.
    Malformed { tag: ProtocolTag },
    /// Not a protocol line at all.
    Noise,
}

/// One decoded surface-protocol line.
///
/// Each variant owns only the fields its tag recognizes. Numeric fields
/// that fail to parse are treated as absent rather than failing the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Surface created (or re-announced; field updates are last-write-wins).
    Create {
        id: String,
        role: Option<String>,
        title: Option<String>,
        format: Option<String>,
        w: Option<u32>,
        h: Option<u32>,
    },
    /// Geometry update, independent of `Create`.
    Configure {
        id: String,
        x: Option<i32>,
        y: Option<i32>,
        w: Option<u32>,
        h: Option<u32>,
    },
    /// Surface destroyed.
    Destroy { id: String },
    /// Role update.
    Role { id: String, role: Option<String> },
    /// Focus gained or lost.
    Focus { id: String, focused: bool },
    /// Parent edge declared on the child surface.
    Parent { id: String, parent: String },
    /// Full replacement of the surface's state flags.
    State { id: String, states: Vec<String> },
    /// Opens a frame for `(id, seq)`.
    FrameBegin { id: String, seq: u64 },
    /// Closes the open frame if `(id, seq)` matches. A missing `id` key
    /// matches whatever frame is open; `seq` must always match.
    FrameEnd { id: Option<String>, seq: u64 },
}

impl SurfaceEvent {
    /// Classify a single line: a well-formed protocol event, a
    /// recognized but malformed tag line, or noise.
    #[must_use]
    pub fn decode(line: &str) -> DecodedLine {
        let line = line.trim_end_matches(['\n', '\r']);
        let (tag, tail) = match line.split_once(char::is_whitespace) {
            Some((tag, tail)) => (tag, tail),
            None => (line, ""),
        };
        let Some(tag) = ProtocolTag::from_token(tag) else {
            return DecodedLine::Noise;
        };
        let kv = KvTail::parse(tail);
        match Self::build(tag, &kv) {
            Some(event) => DecodedLine::Event(event),
            None => DecodedLine::Malformed { tag },
        }
    }

    /// Decode a single line, returning `None` for anything that is not a
    /// well-formed protocol line.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        match Self::decode(line) {
            DecodedLine::Event(event) => Some(event),
            DecodedLine::Malformed { .. } | DecodedLine::Noise => None,
        }
    }

    fn build(tag: ProtocolTag, kv: &KvTail<'_>) -> Option<Self> {
        match tag {
            ProtocolTag::Create => Some(Self::Create {
                id: kv.get("id")?.to_string(),
                role: kv.get_string("role"),
                title: kv.get_string("title"),
                format: kv.get_string("format"),
                w: kv.get_num("w"),
                h: kv.get_num("h"),
            }),
            ProtocolTag::Configure => Some(Self::Configure {
                id: kv.get("id")?.to_string(),
                x: kv.get_num("x"),
                y: kv.get_num("y"),
                w: kv.get_num("w"),
                h: kv.get_num("h"),
            }),
            ProtocolTag::Destroy => Some(Self::Destroy {
                id: kv.get("id")?.to_string(),
            }),
            ProtocolTag::Role => Some(Self::Role {
                id: kv.get("id")?.to_string(),
                role: kv.get_string("role"),
            }),
            ProtocolTag::Focus => Some(Self::Focus {
                id: kv.get("id")?.to_string(),
                focused: kv.get("focused").is_some_and(parse_bool),
            }),
            ProtocolTag::Parent => Some(Self::Parent {
                id: kv.get("id")?.to_string(),
                parent: kv.get("parent")?.to_string(),
            }),
            ProtocolTag::State => Some(Self::State {
                id: kv.get("id")?.to_string(),
                states: kv
                    .get("states")
                    .unwrap_or("")
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            }),
            ProtocolTag::FrameBegin => Some(Self::FrameBegin {
                id: kv.get("id")?.to_string(),
                seq: kv.get_num("seq").unwrap_or(0),
            }),
            ProtocolTag::FrameEnd => Some(Self::FrameEnd {
                id: kv.get("id").map(String::from),
                seq: kv.get_num("seq").unwrap_or(0),
            }),
        }
    }
}

/// Parsed `key=value` tail of a protocol line.
struct KvTail<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> KvTail<'a> {
    fn parse(tail: &'a str) -> Self {
        let pairs = tail
            .split_whitespace()
            .filter_map(|token| token.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();
        Self { pairs }
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        // Last occurrence wins, matching plain map insertion order.
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(String::from)
    }

    fn get_num<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "True" | "yes" | "YES")
}
