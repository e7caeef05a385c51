//! Lexical helpers for the inline markup.
//!
//! All markers are ASCII, so every byte index returned here falls on a char
//! boundary of the scanned `&str`.

pub(crate) const STREAM_BLOCK_CLOSE: &str = "</stream_block>";
const STREAM_ITEM_OPEN: &str = "<stream_item";
const STREAM_ITEM_CLOSE: &str = "</stream_item>";
const STREAM_COMPLETE_OPEN: &str = "<stream_complete>";
const STREAM_COMPLETE_CLOSE: &str = "</stream_complete>";
const OUTPUT_CLOSES: [&str; 2] = ["</output>", "</o>"];

/// Tag families recognized at the top level of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagKind {
    StreamBlock,
    Output,
    Progress,
    WhatsNext,
}

impl TagKind {
    pub(crate) const ALL: [Self; 4] = [
        Self::StreamBlock,
        Self::Output,
        Self::Progress,
        Self::WhatsNext,
    ];

    pub(crate) const fn opener(self) -> &'static str {
        match self {
            Self::StreamBlock => "<stream_block",
            Self::Output => "<output",
            Self::Progress => "<progress",
            Self::WhatsNext => "<whats_next",
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::StreamBlock => "stream_block",
            Self::Output => "output",
            Self::Progress => "progress",
            Self::WhatsNext => "whats_next",
        }
    }
}

/// What a `<` in the buffer turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TagStart {
    /// A recognized opener, possibly still incomplete.
    Tag(TagKind),
    /// The buffer ends inside an opener name (`<`, `<outp`).
    Prefix,
    /// Ordinary prose.
    Text,
}

/// Classify the text starting at a `<`.
pub(crate) fn classify(rest: &str) -> TagStart {
    for kind in TagKind::ALL {
        let opener = kind.opener();
        if let Some(after) = rest.strip_prefix(opener) {
            if after.bytes().next().is_none_or(is_name_boundary) {
                return TagStart::Tag(kind);
            }
        } else if opener.starts_with(rest) {
            return TagStart::Prefix;
        }
    }
    TagStart::Text
}

const fn is_name_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'>' || b == b'/'
}

/// Index just past the `>` that ends the opening tag at the start of `rest`.
///
/// A `>` inside a double-quoted attribute value does not end the tag.
pub(crate) fn opening_end(rest: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, b) in rest.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'>' if !in_quotes => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Byte length of the complete tag at the start of `rest`, or `None` while it
/// is still open.
///
/// A block or output opener written as `/>` has no body to wait for; its
/// extent is the opener alone, which the decoder then rejects.
pub(crate) fn tag_extent(kind: TagKind, rest: &str) -> Option<usize> {
    let open_end = opening_end(rest)?;
    if rest[..open_end].ends_with("/>") {
        return Some(open_end);
    }
    match kind {
        TagKind::Progress | TagKind::WhatsNext => Some(open_end),
        TagKind::StreamBlock => rest[open_end..]
            .find(STREAM_BLOCK_CLOSE)
            .map(|i| open_end + i + STREAM_BLOCK_CLOSE.len()),
        TagKind::Output => {
            find_output_close(&rest[open_end..]).map(|(i, len)| open_end + i + len)
        }
    }
}

/// Earliest `</output>` or `</o>` in `body`, as `(index, length)`.
pub(crate) fn find_output_close(body: &str) -> Option<(usize, usize)> {
    OUTPUT_CLOSES
        .iter()
        .filter_map(|close| body.find(close).map(|i| (i, close.len())))
        .min_by_key(|(i, _)| *i)
}

/// The pieces of a complete tag span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TagParts<'a> {
    /// Raw attribute source between the name and the closing `>` or `/>`.
    pub attrs: &'a str,
    /// Whether the opening tag ended with `/>`.
    pub self_closing: bool,
    /// Content between the opening tag and the closing tag.
    pub body: &'a str,
}

/// Split a complete span returned by [`tag_extent`] into its parts.
pub(crate) fn split_tag(kind: TagKind, span: &str) -> Option<TagParts<'_>> {
    let open_end = opening_end(span)?;
    let inner = &span[kind.opener().len()..open_end - 1];
    let (attrs, self_closing) = match inner.strip_suffix('/') {
        Some(attrs) => (attrs, true),
        None => (inner, false),
    };

    let body = match kind {
        TagKind::Progress | TagKind::WhatsNext => "",
        TagKind::StreamBlock => span[open_end..].strip_suffix(STREAM_BLOCK_CLOSE)?,
        TagKind::Output => {
            let rest = &span[open_end..];
            let (i, _) = find_output_close(rest)?;
            &rest[..i]
        }
    };

    Some(TagParts {
        attrs,
        self_closing,
        body,
    })
}

/// Parsed `name="value"` pairs of an opening tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Attributes<'a>(Vec<(&'a str, &'a str)>);

impl<'a> Attributes<'a> {
    /// Parse whitespace-separated `name="value"` pairs.
    ///
    /// Values are taken verbatim up to the next `"`; there is no escaping.
    pub(crate) fn parse(mut src: &'a str) -> Option<Self> {
        let mut pairs = Vec::new();
        loop {
            src = src.trim_start();
            if src.is_empty() {
                return Some(Self(pairs));
            }

            let eq = src.find('=')?;
            let name = &src[..eq];
            if name.is_empty()
                || !name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
            {
                return None;
            }

            let value_src = src[eq + 1..].strip_prefix('"')?;
            let close = value_src.find('"')?;
            pairs.push((name, &value_src[..close]));

            src = &value_src[close + 1..];
            if !src.is_empty() && !src.starts_with(char::is_whitespace) {
                return None;
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&'a str> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    /// Whether the tag carries exactly these attributes, each once.
    pub(crate) fn has_exactly(&self, names: &[&str]) -> bool {
        self.0.len() == names.len() && names.iter().all(|n| self.get(n).is_some())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An entry inside a `<stream_block>` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockEntry<'a> {
    Item { icon: &'a str, text: &'a str },
    Complete { summary: &'a str },
}

/// Collect the well-formed items and summaries of a stream block body, in
/// document order. Text is trimmed; anything else in the body is dropped.
pub(crate) fn block_entries(body: &str) -> Vec<BlockEntry<'_>> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while let Some(offset) = body[pos..].find('<') {
        let start = pos + offset;
        let rest = &body[start..];

        if let Some((entry, len)) = stream_item(rest).or_else(|| stream_complete(rest)) {
            entries.push(entry);
            pos = start + len;
        } else {
            if rest.starts_with(STREAM_ITEM_OPEN) || rest.starts_with(STREAM_COMPLETE_OPEN) {
                tracing::debug!(fragment = %truncate(rest, 80), "skipping malformed stream block entry");
            }
            pos = start + 1;
        }
    }

    entries
}

fn stream_item(rest: &str) -> Option<(BlockEntry<'_>, usize)> {
    let after = rest.strip_prefix(STREAM_ITEM_OPEN)?;
    if !after.bytes().next().is_some_and(is_name_boundary) {
        return None;
    }

    let open_end = opening_end(rest)?;
    let attrs_src = &rest[STREAM_ITEM_OPEN.len()..open_end - 1];
    let attrs = Attributes::parse(attrs_src)?;
    if !attrs.has_exactly(&["icon"]) {
        return None;
    }
    let icon = attrs.get("icon")?;

    let content = &rest[open_end..];
    let close = content.find(STREAM_ITEM_CLOSE)?;
    let text = content[..close].trim();

    Some((
        BlockEntry::Item { icon, text },
        open_end + close + STREAM_ITEM_CLOSE.len(),
    ))
}

fn stream_complete(rest: &str) -> Option<(BlockEntry<'_>, usize)> {
    let content = rest.strip_prefix(STREAM_COMPLETE_OPEN)?;
    let close = content.find(STREAM_COMPLETE_CLOSE)?;
    let summary = content[..close].trim();

    Some((
        BlockEntry::Complete { summary },
        STREAM_COMPLETE_OPEN.len() + close + STREAM_COMPLETE_CLOSE.len(),
    ))
}

/// Shorten a fragment for log output without splitting a char.
pub(crate) fn truncate(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(i, _)| &s[..i])
}
