//! Header section model
//!
//! One parsed HTTP header block as delivered by the tokenizer: validated field
//! values, per-field occurrence counts, start-line context and the
//! irregularities recorded while tokenizing.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use super::types::{HeaderId, HttpMethod, Infraction, Infractions, SourceId};

/// A single header field in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub id: HeaderId,
    pub name: String,
    pub value: String,
}

/// Parsed header block for one message in one direction
#[derive(Debug, Clone)]
pub struct HeaderSection {
    source: SourceId,
    text: Vec<u8>,
    fields: Vec<HeaderField>,
    counts: BTreeMap<HeaderId, u32>,
    method: Option<HttpMethod>,
    status_code: Option<u16>,
    tcp_close: bool,
    infractions: Infractions,
}

impl HeaderSection {
    /// Create an empty section for one side of the flow
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            text: Vec::new(),
            fields: Vec::new(),
            counts: BTreeMap::new(),
            method: None,
            status_code: None,
            tcp_close: false,
            infractions: Infractions::empty(),
        }
    }

    /// Client section for a request with the given method token
    pub fn request(method: &str) -> Self {
        let mut section = Self::new(SourceId::Client);
        section.method = Some(HttpMethod::from(method));
        section
    }

    /// Server section for a response with the given status code
    pub fn response(status_code: u16) -> Self {
        let mut section = Self::new(SourceId::Server);
        section.status_code = Some(status_code);
        section
    }

    /// Append a header field; repeated fields keep every occurrence
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let id = HeaderId::from_name(&name);
        *self.counts.entry(id).or_insert(0) += 1;
        self.fields.push(HeaderField {
            id,
            name,
            value: value.into().trim().to_string(),
        });
        self
    }

    /// Raw header block bytes as they will be shown to detection
    pub fn with_text(mut self, text: impl Into<Vec<u8>>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_tcp_close(mut self) -> Self {
        self.tcp_close = true;
        self
    }

    pub fn with_infraction(mut self, infraction: Infraction) -> Self {
        self.infractions.insert(infraction);
        self
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn text_length(&self) -> u64 {
        self.text.len() as u64
    }

    pub fn method(&self) -> Option<HttpMethod> {
        self.method
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn tcp_close(&self) -> bool {
        self.tcp_close
    }

    pub fn infractions(&self) -> Infractions {
        self.infractions
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Number of times a field kind occurred
    pub fn count(&self, id: HeaderId) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Occurrences of a field kind in arrival order
    pub fn values(&self, id: HeaderId) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .iter()
            .filter(move |f| f.id == id)
            .map(|f| f.value.as_str())
    }

    /// Normalized value of a field kind
    ///
    /// Content-Length takes the first occurrence; list-valued fields are
    /// comma-joined in arrival order.
    pub fn normalized(&self, id: HeaderId) -> Option<Cow<'_, str>> {
        let mut values = self.values(id);
        let first = values.next()?;
        if id == HeaderId::ContentLength {
            return Some(Cow::Borrowed(first));
        }
        match values.next() {
            None => Some(Cow::Borrowed(first)),
            Some(second) => {
                let mut joined = format!("{first},{second}");
                for v in values {
                    joined.push(',');
                    joined.push_str(v);
                }
                Some(Cow::Owned(joined))
            }
        }
    }

    /// Last non-empty transfer coding across all Transfer-Encoding fields
    pub fn final_transfer_coding(&self) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .filter(|f| f.id == HeaderId::TransferEncoding)
            .flat_map(|f| f.value.rsplit(','))
            .map(str::trim)
            .find(|coding| !coding.is_empty())
    }

    pub fn has_header(&self, id: HeaderId) -> bool {
        self.count(id) > 0
    }
}

impl fmt::Display for HeaderSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "header section ({})", self.source)?;
        if let Some(method) = self.method {
            writeln!(f, "  method: {:?}", method)?;
        }
        if let Some(status) = self.status_code {
            writeln!(f, "  status: {}", status)?;
        }
        for field in &self.fields {
            writeln!(f, "  {}: {}", field.name, field.value)?;
        }
        if !self.infractions.is_empty() {
            let names: Vec<&str> = self.infractions.iter().map(Infraction::name).collect();
            writeln!(f, "  infractions: {}", names.join(", "))?;
        }
        if self.tcp_close {
            writeln!(f, "  tcp close")?;
        }
        write!(f, "  text length: {}", self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_repeated_fields() {
        let section = HeaderSection::request("POST")
            .with_header("Content-Length", "10")
            .with_header("content-length", "20")
            .with_header("Host", "example.com");

        assert_eq!(section.count(HeaderId::ContentLength), 2);
        assert_eq!(section.count(HeaderId::Host), 1);
        assert_eq!(section.count(HeaderId::TransferEncoding), 0);
    }

    #[test]
    fn test_content_length_normalizes_to_first() {
        let section = HeaderSection::response(200)
            .with_header("Content-Length", " 10 ")
            .with_header("Content-Length", "20");
        assert_eq!(section.normalized(HeaderId::ContentLength).as_deref(), Some("10"));
    }

    #[test]
    fn test_list_fields_join() {
        let section = HeaderSection::response(200)
            .with_header("Transfer-Encoding", "gzip")
            .with_header("Transfer-Encoding", "chunked");
        assert_eq!(
            section.normalized(HeaderId::TransferEncoding).as_deref(),
            Some("gzip,chunked")
        );
    }

    #[test]
    fn test_final_transfer_coding() {
        let section = HeaderSection::request("POST")
            .with_header("Transfer-Encoding", "chunked, gzip , ")
            .with_header("X-Other", "1");
        assert_eq!(section.final_transfer_coding(), Some("gzip"));

        let section = HeaderSection::request("POST")
            .with_header("Transfer-Encoding", "gzip")
            .with_header("Transfer-Encoding", "CHUNKED");
        assert_eq!(section.final_transfer_coding(), Some("CHUNKED"));

        let section = HeaderSection::request("POST").with_header("Transfer-Encoding", " , ");
        assert_eq!(section.final_transfer_coding(), None);
    }

    #[test]
    fn test_display_lists_fields() {
        let section = HeaderSection::response(204)
            .with_header("Server", "nginx")
            .with_infraction(Infraction::HeaderFolding)
            .with_tcp_close();
        let dump = section.to_string();
        assert!(dump.contains("status: 204"));
        assert!(dump.contains("Server: nginx"));
        assert!(dump.contains("header_folding"));
        assert!(dump.contains("tcp close"));
    }
}
