//! # Patrones de Ruta
//! src/router/pattern.rs
//!
//! Un patrón es una lista de segmentos literales y placeholders:
//!
//! ```text
//! /documents/{doc_id}/parameters/{name}
//!  ─literal─  ─param─  ──literal─  param
//! ```
//!
//! Los segmentos vacíos se ignoran: `/a//b/` equivale a `/a/b`.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::PatternError;
use crate::http::percent_decode;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"^\{([A-Za-z_][A-Za-z0-9_]*)\}$").expect("placeholder regex is valid")
    })
}

/// Patrón de ruta ya parseado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parsea un patrón como `/cam/setups/{setup_id}`
    ///
    /// # Errores
    ///
    /// - El patrón no empieza con `/`
    /// - Un segmento tiene llaves pero no es un placeholder válido
    /// - Un placeholder se repite
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(raw.to_string()));
        }

        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        for part in raw.split('/').filter(|s| !s.is_empty()) {
            if !part.contains('{') && !part.contains('}') {
                segments.push(Segment::Literal(part.to_string()));
                continue;
            }

            let name = placeholder_regex()
                .captures(part)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .ok_or_else(|| PatternError::InvalidPlaceholder {
                    pattern: raw.to_string(),
                    segment: part.to_string(),
                })?;

            if !seen.insert(name.clone()) {
                return Err(PatternError::DuplicatePlaceholder {
                    pattern: raw.to_string(),
                    name,
                });
            }
            segments.push(Segment::Param(name));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// El patrón tal como se registró
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Cantidad de placeholders (menos es más específico)
    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count()
    }

    /// Nombres de los placeholders, en orden
    pub fn placeholders(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Intenta hacer match con los segmentos (no vacíos) de un path
    pub fn matches(&self, path_segments: &[&str]) -> Option<PathParams> {
        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (segment, actual) in self.segments.iter().zip(path_segments) {
            match segment {
                Segment::Literal(literal) => {
                    if literal.as_str() != *actual {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), percent_decode(actual));
                }
            }
        }

        Some(PathParams(params))
    }

    /// Misma forma: iguales salvo por el nombre de los placeholders
    pub fn same_shape(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// `true` si existe algún path que haga match con ambos patrones
    pub fn overlaps(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }
}

/// Divide un path en sus segmentos no vacíos
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Valores capturados por los placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
