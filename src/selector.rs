//! Function selection
//!
//! Chooses which executable to drive next. Plain mode draws uniformly;
//! when a function-complexity summary is supplied, selection is
//! weighted by `1 + call-outs + controls + switch-cases + conditional
//! expressions + short-circuits`, sampled through a cumulative table
//! with binary search.
//!
//! The complexity summary is an external hand-off file with three
//! labelled sections (name dictionary, call-graph adjacency, per-
//! function counters); see [`ComplexitySummary::import`].

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{ApiModel, ExecId};
use crate::random::Rng;

const NAME_DICT_HEADER: &str = ">>>>>>>>>>>>>nameDict";
const ADJ_LIST_HEADER: &str = ">>>>>>>>>>>>>adjList";
const COMPLEXITY_HEADER: &str = ">>>>>>>>>>>>>complexity(controls,sw_cases,cond_exprs,short_cirs)";

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<&'a str> {
    tokens
        .next()
        .ok_or_else(|| Error::Complexity(format!("unexpected end of file reading {what}")))
}

fn next_number<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<usize> {
    let tok = next_token(tokens, what)?;
    tok.parse()
        .map_err(|_| Error::Complexity(format!("bad {what}: {tok}")))
}

fn expect_header(tok: &str, header: &str) -> Result<()> {
    if tok == header {
        Ok(())
    } else {
        Err(Error::Complexity(format!(
            "expected header {header}, found {tok}"
        )))
    }
}

/// Static complexity counters for one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionComplexity {
    /// Control statements
    pub controls: u32,
    /// Switch cases
    pub switch_cases: u32,
    /// Conditional expressions
    pub cond_exprs: u32,
    /// Short-circuit operators
    pub short_circuits: u32,
    /// Mangled names of callees
    pub calls: Vec<String>,
}

impl FunctionComplexity {
    /// Selection weight.
    #[must_use]
    pub fn score(&self) -> f64 {
        f64::from(
            1 + self.controls + self.switch_cases + self.cond_exprs + self.short_circuits,
        ) + self.calls.len() as f64
    }
}

/// Parsed function-complexity summary, keyed by mangled name.
#[derive(Debug, Clone, Default)]
pub struct ComplexitySummary {
    map: HashMap<String, FunctionComplexity>,
}

impl ComplexitySummary {
    /// Parse the three-section summary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or malformed.
    pub fn import(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse summary text (sections are whitespace-tokenised).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Complexity`] on a missing header, truncated
    /// section, or a complexity row naming an unknown function index.
    pub fn parse(content: &str) -> Result<Self> {
        let mut tokens = content.split_whitespace();

        let tok = next_token(&mut tokens, "nameDict header")?;
        expect_header(tok, NAME_DICT_HEADER)?;
        let n = next_number(&mut tokens, "name count")?;
        let mut names: HashMap<usize, String> = HashMap::with_capacity(n);
        for _ in 0..n {
            let idx = next_number(&mut tokens, "name index")?;
            let name = next_token(&mut tokens, "mangled name")?.to_string();
            names.insert(idx, name);
        }

        let tok = next_token(&mut tokens, "adjList header")?;
        expect_header(tok, ADJ_LIST_HEADER)?;
        let m = next_number(&mut tokens, "adjacency count")?;
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::with_capacity(m);
        for _ in 0..m {
            let node = next_number(&mut tokens, "node index")?;
            let len = next_number(&mut tokens, "adjacency length")?;
            let mut adj = Vec::with_capacity(len);
            for _ in 0..len {
                adj.push(next_number(&mut tokens, "adjacent node")?);
            }
            adjacency.insert(node, adj);
        }

        let tok = next_token(&mut tokens, "complexity header")?;
        expect_header(tok, COMPLEXITY_HEADER)?;
        let k = next_number(&mut tokens, "complexity count")?;
        let mut map = HashMap::with_capacity(k);
        for _ in 0..k {
            let idx = next_number(&mut tokens, "function index")?;
            let controls = next_number(&mut tokens, "controls")? as u32;
            let switch_cases = next_number(&mut tokens, "switch cases")? as u32;
            let cond_exprs = next_number(&mut tokens, "cond exprs")? as u32;
            let short_circuits = next_number(&mut tokens, "short circuits")? as u32;

            let Some(name) = names.get(&idx) else {
                return Err(Error::Complexity(format!(
                    "complexity row references unknown function index {idx}"
                )));
            };
            let calls = adjacency
                .get(&idx)
                .map(|adj| {
                    adj.iter()
                        .filter_map(|n| names.get(n).cloned())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            map.insert(
                name.clone(),
                FunctionComplexity {
                    controls,
                    switch_cases,
                    cond_exprs,
                    short_circuits,
                    calls,
                },
            );
        }

        Ok(Self { map })
    }

    /// Counters for a mangled name.
    #[must_use]
    pub fn get(&self, mangled: &str) -> Option<&FunctionComplexity> {
        self.map.get(mangled)
    }

    /// Number of functions with counters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the summary carries no counters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Uniform over the pool
    Random,
    /// Complexity-weighted, falling back to uniform without a summary
    ComplexityWeighted,
}

/// Chooses the next executable from a pool.
#[derive(Debug)]
pub struct FunctionSelector<'a> {
    pool: Vec<ExecId>,
    mode: SelectionMode,
    summary: Option<&'a ComplexitySummary>,
}

impl<'a> FunctionSelector<'a> {
    /// Selector over `pool`.
    #[must_use]
    pub fn new(pool: Vec<ExecId>, mode: SelectionMode, summary: Option<&'a ComplexitySummary>) -> Self {
        Self {
            pool,
            mode,
            summary,
        }
    }

    /// Pick the next target; `None` on an empty pool.
    pub fn next(&self, model: &ApiModel, rng: &mut Rng) -> Option<ExecId> {
        if self.pool.is_empty() {
            return None;
        }
        let summary = match (self.mode, self.summary) {
            (SelectionMode::ComplexityWeighted, Some(s)) if !s.is_empty() => s,
            _ => {
                let idx = rng.next_int(self.pool.len());
                return Some(self.pool[idx]);
            }
        };

        let mut cumulative = Vec::with_capacity(self.pool.len());
        let mut total = 0.0f64;
        for id in &self.pool {
            let exec = model.executable(*id);
            let score = exec
                .mangled_name
                .as_deref()
                .and_then(|m| summary.get(m))
                .map_or(1.0, FunctionComplexity::score);
            total += score;
            cumulative.push(total);
        }
        for score in &mut cumulative {
            *score /= total;
        }

        let target = rng.next_f64();
        let (mut lo, mut hi) = (0usize, cumulative.len());
        while hi - lo > 1 {
            let mid = (hi + lo) / 2;
            if cumulative[mid] < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let idx = if cumulative[lo] > target {
            lo
        } else {
            hi.min(cumulative.len() - 1)
        };
        Some(self.pool[idx])
    }
}
