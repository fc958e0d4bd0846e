use ahash::{AHashMap, AHashSet};

/// Per-source-line dependency set, plus the mark used by the backward
/// reachability pass.
#[derive(Debug, Default)]
pub struct LineRecord {
    pub dependencies: AHashSet<u32>,
    /// Monotonic: set once during slice solving, never cleared.
    pub visited: bool,
}

/// Maps each executed source line to the set of lines it depends on.
///
/// Records are created lazily on the first dependency recorded for a line;
/// insertion deduplicates. Self-dependence is permitted (initial augmented
/// writes, mutating method calls).
#[derive(Debug, Default)]
pub struct DependenceGraph {
    lines: AHashMap<u32, LineRecord>,
}

impl DependenceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `dependencies` into the record for `line`, creating it if
    /// needed. An empty iterator still materializes the record.
    pub fn record<I>(&mut self, line: u32, dependencies: I)
    where
        I: IntoIterator<Item = u32>,
    {
        self.lines.entry(line).or_default().dependencies.extend(dependencies);
    }

    #[must_use]
    pub fn get(&self, line: u32) -> Option<&LineRecord> {
        self.lines.get(&line)
    }

    /// Transitive closure of dependencies rooted at `criterion`, sorted.
    ///
    /// The dependence graph contains self-loops and can contain cycles when
    /// augmented writes and aliased mutations co-occur; the visited mark
    /// guarantees termination. Lines without a record contribute only
    /// themselves.
    pub fn solve(&mut self, criterion: u32) -> Vec<u32> {
        let mut keep = AHashSet::new();
        let mut work = vec![criterion];
        while let Some(line) = work.pop() {
            keep.insert(line);
            let Some(record) = self.lines.get_mut(&line) else {
                continue;
            };
            if record.visited {
                continue;
            }
            record.visited = true;
            for &dep in &record.dependencies {
                keep.insert(dep);
                work.push(dep);
            }
        }
        let mut keep: Vec<u32> = keep.into_iter().collect();
        keep.sort_unstable();
        keep
    }

    /// Iterates all recorded lines in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &LineRecord)> {
        self.lines.iter().map(|(line, record)| (*line, record))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
