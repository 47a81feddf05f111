use std::collections::HashMap;

use quill_syntax::{parse_java_file, print_file, FileId, NodeId, TextSize, Tree};

const CARET: &str = "/*caret*/";

/// Removes a single `/*caret*/` marker, returning the text and its offset.
pub fn extract_caret(fixture: &str) -> (String, TextSize) {
    let offset = fixture
        .find(CARET)
        .expect("fixture missing /*caret*/ marker");
    let mut text = String::with_capacity(fixture.len());
    text.push_str(&fixture[..offset]);
    text.push_str(&fixture[offset + CARET.len()..]);
    (text, TextSize::from(offset as u32))
}

/// Strips `$N` and `/*caret*/` markers (the caret is marker 0).
fn extract_markers(text: &str) -> (String, Vec<(u32, usize)>) {
    let mut out = String::with_capacity(text.len());
    let mut markers = Vec::new();
    let mut rest = text;
    loop {
        let dollar = rest.find('$').filter(|&i| {
            rest[i + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        });
        let caret = rest.find(CARET);
        let next = match (dollar, caret) {
            (Some(d), Some(c)) => Some(d.min(c)),
            (d, c) => d.or(c),
        };
        let Some(at) = next else {
            out.push_str(rest);
            return (out, markers);
        };
        out.push_str(&rest[..at]);
        if rest[at..].starts_with(CARET) {
            markers.push((0, out.len()));
            rest = &rest[at + CARET.len()..];
        } else {
            let digits = rest[at + 1..]
                .chars()
                .take_while(char::is_ascii_digit)
                .count();
            let id: u32 = rest[at + 1..at + 1 + digits]
                .parse()
                .expect("marker id fits in u32");
            markers.push((id, out.len()));
            rest = &rest[at + 1 + digits..];
        }
    }
}

/// A multi-file Java fixture loaded into a single [`Tree`].
///
/// ```text
/// //- /Main.java
/// class Main { void m() { $0foo(); } }
/// //- /lib/Lib.java read-only
/// class Lib {}
/// //- /messages.properties
/// greeting=foo
/// ```
///
/// Without any `//-` header the whole text is `/Main.java`. Marker ids must be
/// unique across the fixture.
pub struct Fixture {
    pub tree: Tree,
    files: Vec<(String, FileId)>,
    markers: HashMap<u32, (FileId, TextSize)>,
}

impl Fixture {
    #[must_use]
    pub fn parse(fixture: &str) -> Self {
        let mut sections: Vec<(String, bool, String)> = Vec::new();
        for line in fixture.lines() {
            if let Some(header) = line.strip_prefix("//-") {
                let mut parts = header.split_whitespace();
                let path = parts.next().expect("fixture header needs a path").to_string();
                let read_only = parts.any(|p| p == "read-only");
                sections.push((path, read_only, String::new()));
                continue;
            }
            if sections.is_empty() {
                sections.push(("/Main.java".to_string(), false, String::new()));
            }
            if let Some((_, _, text)) = sections.last_mut() {
                text.push_str(line);
                text.push('\n');
            }
        }

        let mut tree = Tree::new();
        let mut files = Vec::new();
        let mut markers = HashMap::new();
        for (path, read_only, text) in sections {
            let (text, found) = extract_markers(&text);
            let file = if path.ends_with(".java") {
                parse_java_file(&mut tree, path.clone(), &text)
                    .unwrap_or_else(|err| panic!("fixture `{path}` failed to parse: {err}"))
            } else {
                tree.add_text_file(path.clone(), text)
            };
            if read_only {
                tree.set_read_only(file, true).expect("fixture file exists");
            }
            for (id, offset) in found {
                let prev = markers.insert(id, (file, TextSize::from(offset as u32)));
                assert!(prev.is_none(), "duplicate fixture marker ${id}");
            }
            files.push((path, file));
        }
        tracing::debug!(files = files.len(), markers = markers.len(), "parsed fixture");
        Self {
            tree,
            files,
            markers,
        }
    }

    #[must_use]
    pub fn file(&self, path: &str) -> FileId {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, id)| *id)
            .unwrap_or_else(|| panic!("fixture has no file `{path}`"))
    }

    #[must_use]
    pub fn marker(&self, id: u32) -> (FileId, TextSize) {
        *self
            .markers
            .get(&id)
            .unwrap_or_else(|| panic!("fixture has no marker ${id}"))
    }

    #[must_use]
    pub fn caret(&self) -> (FileId, TextSize) {
        self.marker(0)
    }

    /// Innermost node at marker `id`.
    #[must_use]
    pub fn node_at(&self, id: u32) -> NodeId {
        let (file, offset) = self.marker(id);
        self.tree
            .node_at_offset(file, offset)
            .unwrap_or_else(|| panic!("no node at marker ${id}"))
    }

    /// Current (printed) text of `path`.
    #[must_use]
    pub fn text(&self, path: &str) -> String {
        print_file(&self.tree, self.file(path)).expect("fixture file exists")
    }
}
