/// Destructuring pattern used by `as` and `reduce`.
///
/// # Examples
/// ```text
/// . as $doc | ...
/// .point as [$x, $y] | ...
/// .user as {name: $n, $age} | ...
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Bind the whole value (`$name`)
    Variable(String),

    /// Bind array elements by position; missing elements bind `null`
    Array(Vec<Pattern>),

    /// Bind object values by key; missing keys bind `null`
    Object(Vec<(String, Pattern)>),
}

impl Pattern {
    /// Names bound by this pattern, in source order.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Pattern::Variable(name) => names.push(name),
            Pattern::Array(items) => items.iter().for_each(|p| p.collect_variables(names)),
            Pattern::Object(entries) => entries
                .iter()
                .for_each(|(_, p)| p.collect_variables(names)),
        }
    }
}
