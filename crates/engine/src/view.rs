//! Caller-facing result shapes.

use derive_more::{Display, Error};
use futures::stream::BoxStream;
use indexmap::IndexMap;
use std::fmt::{Debug, Display as FmtDisplay, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;
use terminal_size::{Width, terminal_size};
use trawl_loaders::{Content, suggest};
use trawl_metrics::{HumanSize, bytes_to_human};

const DEFAULT_WIDTH: usize = 80;

fn terminal_width() -> usize {
    terminal_size().map(|(Width(columns), _)| usize::from(columns)).unwrap_or(DEFAULT_WIDTH)
}

/// A file that loaded to something worth keeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub path: PathBuf,
    pub contents: Arc<Content>,
}

/// Returned by [`LazyView::stream`] once the entries have been handed out.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[display("lazy view already consumed; re-run the load to iterate again")]
pub struct Exhausted;

/// Outcome of [`MapView::lookup`].
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Arc<Content>),
    /// No exact hit, but this key is close.
    Suggestion(String),
    Missing,
}

/// Identity to loaded contents, in load order. Last write wins.
#[derive(Debug, Clone)]
pub struct MapView {
    name: &'static str,
    entries: IndexMap<String, Loaded>,
}

impl MapView {
    pub(crate) fn new(name: &'static str) -> Self {
        Self { name, entries: IndexMap::new() }
    }

    pub(crate) fn insert(&mut self, identity: String, loaded: Loaded) {
        self.entries.insert(identity, loaded);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Content>> {
        self.entries.get(key).map(|loaded| &loaded.contents)
    }

    /// Like [`lookup`](Self::lookup), so a near miss is still logged, but
    /// anything other than an exact hit yields `default`.
    pub fn get_or(&self, key: &str, default: Arc<Content>) -> Arc<Content> {
        match self.lookup(key) {
            Lookup::Found(contents) => Arc::clone(contents),
            Lookup::Suggestion(_) | Lookup::Missing => default,
        }
    }

    /// Exact lookup, falling back to a "did you mean" suggestion.
    pub fn lookup(&self, key: &str) -> Lookup<'_> {
        if let Some(contents) = self.get(key) {
            return Lookup::Found(contents);
        }
        match suggest(self.entries.keys().map(String::as_str), key) {
            Some(suggestion) => {
                tracing::info!("{key} is not a valid key. Did you mean {suggestion}?");
                Lookup::Suggestion(suggestion)
            },
            None => Lookup::Missing,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<Content>> {
        self.entries.values().map(|loaded| &loaded.contents)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Loaded)> {
        self.entries.iter()
    }

    /// Source paths, for handing to a metrics collector.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.values().map(|loaded| loaded.path.clone()).collect()
    }

    pub fn into_map(self) -> IndexMap<String, Loaded> {
        self.entries
    }

    /// Combined on-disk size, if every entry's file can still be stat'd.
    pub fn total_size(&self) -> Option<HumanSize> {
        let mut total = 0;
        for loaded in self.entries.values() {
            total += std::fs::metadata(&loaded.path).ok()?.len();
        }
        bytes_to_human(total)
    }

    /// Render as `Name((key, value),\n     (key, value))`.
    ///
    /// A value that is bulky, or whose text reaches `width` columns, is shown
    /// as its `<Kind>` tag instead.
    pub fn render(&self, width: usize) -> String {
        let items: Vec<String> = self
            .entries
            .iter()
            .map(|(key, loaded)| {
                let text = loaded.contents.to_string();
                match loaded.contents.is_bulky() || text.chars().count() >= width {
                    true => format!("({key}, <{}>)", loaded.contents.kind()),
                    false => format!("({key}, {text})"),
                }
            })
            .collect();
        let separator = format!(",\n{}", " ".repeat(self.name.len() + 1));
        let body = format!("{}({})", self.name, items.join(&separator));
        match self.total_size() {
            Some(size) => format!("[{size}] {body}"),
            None => body,
        }
    }
}

impl FmtDisplay for MapView {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.render(terminal_width()))
    }
}

/// Single-pass view over entries that are loaded as they're polled.
pub struct LazyView {
    name: &'static str,
    stream: Option<BoxStream<'static, (String, Loaded)>>,
}

impl LazyView {
    pub(crate) fn new(name: &'static str, stream: BoxStream<'static, (String, Loaded)>) -> Self {
        Self { name, stream: Some(stream) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_exhausted(&self) -> bool {
        self.stream.is_none()
    }

    /// Hand out the entry stream. Only the first call succeeds.
    pub fn stream(&mut self) -> Result<BoxStream<'static, (String, Loaded)>, Exhausted> {
        self.stream.take().ok_or(Exhausted)
    }
}

impl Debug for LazyView {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("LazyView")
            .field("name", &self.name)
            .field("exhausted", &self.is_exhausted())
            .finish_non_exhaustive()
    }
}

impl FmtDisplay for LazyView {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = match self.is_exhausted() {
            true => "exhausted",
            false => "pending",
        };
        write!(f, "<LazyView {}: {state}>", self.name)
    }
}

/// What a load hands back: eager mapping or lazy sequence.
#[derive(Debug)]
pub enum ResultView {
    Map(MapView),
    Lazy(LazyView),
}

impl ResultView {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Map(map) => map.name(),
            Self::Lazy(lazy) => lazy.name(),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Self::Lazy(_))
    }

    pub fn into_map(self) -> Option<MapView> {
        match self {
            Self::Map(map) => Some(map),
            Self::Lazy(_) => None,
        }
    }

    pub fn into_lazy(self) -> Option<LazyView> {
        match self {
            Self::Lazy(lazy) => Some(lazy),
            Self::Map(_) => None,
        }
    }
}

impl FmtDisplay for ResultView {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Map(map) => FmtDisplay::fmt(map, f),
            Self::Lazy(lazy) => FmtDisplay::fmt(lazy, f),
        }
    }
}
