//! Setting paths
//!
//! On the wire a path is every key prefixed with `@@`: the root is `""` and
//! `Video / Renderer` is `@@Video@@Renderer`.

/// Separator placed before every key of an encoded path
pub const PATH_SEPARATOR: &str = "@@";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SettingPath(Vec<String>);

impl SettingPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse the wire form (`@@a@@b`)
    pub fn parse(encoded: &str) -> Self {
        Self(
            encoded
                .split(PATH_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Parse user input: the wire form, or keys separated by `/`
    pub fn parse_user(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with(PATH_SEPARATOR) {
            return Self::parse(input);
        }

        Self(
            input
                .split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Last key of the path (`None` for the root)
    pub fn key(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Wire form passed to the engine
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|s| format!("{}{}", PATH_SEPARATOR, s))
            .collect()
    }

    /// Human readable form (`Video / Renderer`)
    pub fn title(&self) -> String {
        self.0.join(" / ")
    }
}

impl std::fmt::Display for SettingPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}
