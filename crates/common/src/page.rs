use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Sort direction of a single ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One ordering key of a paged query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub direction: Direction,
}

impl<F> Sort<F> {
    pub fn asc(field: F) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: F) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }
}

/// Errors produced while parsing a `field[,asc|desc]` sort expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortParseError {
    #[error("sort expression is empty")]
    Empty,

    #[error("unknown sort field: {0}")]
    UnknownField(String),

    #[error("unknown sort direction: {0}")]
    UnknownDirection(String),
}

impl<F: FromStr> FromStr for Sort<F> {
    type Err = SortParseError;

    /// Parses `field` or `field,asc` / `field,desc` (direction is case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(str::trim);
        let field = match parts.next() {
            Some(f) if !f.is_empty() => f,
            _ => return Err(SortParseError::Empty),
        };
        let field = field
            .parse::<F>()
            .map_err(|_| SortParseError::UnknownField(field.to_string()))?;

        let direction = match parts.next() {
            None | Some("") => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
            Some(d) => return Err(SortParseError::UnknownDirection(d.to_string())),
        };

        Ok(Self { field, direction })
    }
}

/// Zero-based page selection plus ordering for a paged search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<F> {
    pub page: u32,
    pub size: u32,
    pub sort: Vec<Sort<F>>,
}

impl<F> PageRequest<F> {
    /// Creates an unsorted page request. A size of zero is bumped to one.
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.max(1),
            sort: Vec::new(),
        }
    }

    /// Appends an ordering key.
    pub fn sorted_by(mut self, sort: Sort<F>) -> Self {
        self.sort.push(sort);
        self
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    /// Maximum number of rows to return.
    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, page: u32, size: u32, total_elements: u64) -> Self {
        let size = size.max(1);
        Self {
            content,
            page,
            size,
            total_elements,
            total_pages: total_elements.div_ceil(u64::from(size)),
        }
    }

    /// An empty page at the given position.
    pub fn empty(page: u32, size: u32) -> Self {
        Self::new(Vec::new(), page, size, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Transforms the page content, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }

    /// Replaces the content, keeping the paging metadata.
    pub fn with_content<U>(self, content: Vec<U>) -> Page<U> {
        Page {
            content,
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}
