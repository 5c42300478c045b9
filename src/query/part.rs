//! Property conditions ("parts") parsed from a method name.
//!
//! Each clause of a derived-query method name, e.g. `PriceLessThan`, becomes one
//! [`PropertyCondition`]: a property path, an [`Operator`] and a case-folding mode.
//! The operator set is closed. Every variant carries its keywords, its parameter arity
//! and its rendering; operators the compiler cannot render are still recognized so
//! that compilation can reject them by name.

use crate::metadata::PropertyPath;

/// Comparison operator of a property condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    SimpleProperty,
    NegatingSimpleProperty,
    IsNull,
    IsNotNull,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Like,
    NotLike,
    StartingWith,
    EndingWith,
    Containing,
    NotContaining,
    In,
    NotIn,
    Regex,
    True,
    False,
    // Recognized but not rendered by the compiler.
    Between,
    Before,
    After,
    IsEmpty,
    IsNotEmpty,
    Near,
    Within,
    Exists,
}

/// Wildcards applied to the bound value of like-family operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikePattern {
    /// `%value%`
    Contains,
    /// `value%`
    StartsWith,
    /// `%value`
    EndsWith,
}

impl LikePattern {
    pub fn apply(self, value: &str) -> String {
        match self {
            LikePattern::Contains => format!("%{value}%"),
            LikePattern::StartsWith => format!("{value}%"),
            LikePattern::EndsWith => format!("%{value}"),
        }
    }
}

impl Operator {
    /// Every operator, in keyword-table order.
    pub const ALL: [Operator; 27] = [
        Operator::IsNotNull,
        Operator::IsNull,
        Operator::Between,
        Operator::LessThan,
        Operator::LessThanEqual,
        Operator::GreaterThan,
        Operator::GreaterThanEqual,
        Operator::Before,
        Operator::After,
        Operator::NotLike,
        Operator::Like,
        Operator::StartingWith,
        Operator::EndingWith,
        Operator::IsNotEmpty,
        Operator::IsEmpty,
        Operator::NotContaining,
        Operator::Containing,
        Operator::NotIn,
        Operator::In,
        Operator::Near,
        Operator::Within,
        Operator::Regex,
        Operator::Exists,
        Operator::True,
        Operator::False,
        Operator::NegatingSimpleProperty,
        Operator::SimpleProperty,
    ];

    /// Keywords selecting this operator at the end of a clause.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Operator::SimpleProperty => &["Is", "Equals"],
            Operator::NegatingSimpleProperty => &["IsNot", "Not"],
            Operator::IsNull => &["IsNull", "Null"],
            Operator::IsNotNull => &["IsNotNull", "NotNull"],
            Operator::LessThan => &["IsLessThan", "LessThan"],
            Operator::LessThanEqual => &["IsLessThanEqual", "LessThanEqual"],
            Operator::GreaterThan => &["IsGreaterThan", "GreaterThan"],
            Operator::GreaterThanEqual => &["IsGreaterThanEqual", "GreaterThanEqual"],
            Operator::Like => &["IsLike", "Like"],
            Operator::NotLike => &["IsNotLike", "NotLike"],
            Operator::StartingWith => &["IsStartingWith", "StartingWith", "StartsWith"],
            Operator::EndingWith => &["IsEndingWith", "EndingWith", "EndsWith"],
            Operator::Containing => &["IsContaining", "Containing", "Contains"],
            Operator::NotContaining => &["IsNotContaining", "NotContaining", "NotContains"],
            Operator::In => &["IsIn", "In"],
            Operator::NotIn => &["IsNotIn", "NotIn"],
            Operator::Regex => &["MatchesRegex", "Matches", "Regex"],
            Operator::True => &["IsTrue", "True"],
            Operator::False => &["IsFalse", "False"],
            Operator::Between => &["IsBetween", "Between"],
            Operator::Before => &["IsBefore", "Before"],
            Operator::After => &["IsAfter", "After"],
            Operator::IsEmpty => &["IsEmpty", "Empty"],
            Operator::IsNotEmpty => &["IsNotEmpty", "NotEmpty"],
            Operator::Near => &["IsNear", "Near"],
            Operator::Within => &["IsWithin", "Within"],
            Operator::Exists => &["Exists"],
        }
    }

    /// Number of arguments the operator consumes in its own semantics.
    pub fn arity(self) -> usize {
        match self {
            Operator::IsNull
            | Operator::IsNotNull
            | Operator::True
            | Operator::False
            | Operator::IsEmpty
            | Operator::IsNotEmpty
            | Operator::Exists => 0,
            Operator::Between => 2,
            _ => 1,
        }
    }

    /// Upper-case type name used in diagnostics, e.g. `LESS_THAN_EQUAL`.
    pub fn type_name(self) -> &'static str {
        match self {
            Operator::SimpleProperty => "SIMPLE_PROPERTY",
            Operator::NegatingSimpleProperty => "NEGATING_SIMPLE_PROPERTY",
            Operator::IsNull => "IS_NULL",
            Operator::IsNotNull => "IS_NOT_NULL",
            Operator::LessThan => "LESS_THAN",
            Operator::LessThanEqual => "LESS_THAN_EQUAL",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::GreaterThanEqual => "GREATER_THAN_EQUAL",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT_LIKE",
            Operator::StartingWith => "STARTING_WITH",
            Operator::EndingWith => "ENDING_WITH",
            Operator::Containing => "CONTAINING",
            Operator::NotContaining => "NOT_CONTAINING",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Regex => "REGEX",
            Operator::True => "TRUE",
            Operator::False => "FALSE",
            Operator::Between => "BETWEEN",
            Operator::Before => "BEFORE",
            Operator::After => "AFTER",
            Operator::IsEmpty => "IS_EMPTY",
            Operator::IsNotEmpty => "IS_NOT_EMPTY",
            Operator::Near => "NEAR",
            Operator::Within => "WITHIN",
            Operator::Exists => "EXISTS",
        }
    }

    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            Operator::Between
                | Operator::Before
                | Operator::After
                | Operator::IsEmpty
                | Operator::IsNotEmpty
                | Operator::Near
                | Operator::Within
                | Operator::Exists
        )
    }

    /// Case folding only makes sense for operators comparing a single scalar value.
    pub fn supports_ignore_case(self) -> bool {
        matches!(
            self,
            Operator::SimpleProperty
                | Operator::NegatingSimpleProperty
                | Operator::LessThan
                | Operator::LessThanEqual
                | Operator::GreaterThan
                | Operator::GreaterThanEqual
                | Operator::Like
                | Operator::NotLike
                | Operator::StartingWith
                | Operator::EndingWith
                | Operator::Containing
                | Operator::NotContaining
        )
    }

    /// Wildcards the binder wraps around the bound value.
    pub fn like_pattern(self) -> Option<LikePattern> {
        match self {
            Operator::Containing | Operator::NotContaining => Some(LikePattern::Contains),
            Operator::StartingWith => Some(LikePattern::StartsWith),
            Operator::EndingWith => Some(LikePattern::EndsWith),
            _ => None,
        }
    }

    /// Render the condition with `lhs` as the column expression and `rhs` as the
    /// parameter expression. `None` for operators the compiler does not support.
    pub fn render(self, lhs: &str, rhs: &str) -> Option<String> {
        let sql = match self {
            Operator::SimpleProperty => format!("{lhs}={rhs}"),
            Operator::NegatingSimpleProperty => format!("{lhs}<>{rhs}"),
            Operator::IsNull => format!("{lhs}=NULL"),
            Operator::IsNotNull => format!("{lhs}<>NULL"),
            Operator::LessThan => format!("{lhs}<{rhs}"),
            Operator::LessThanEqual => format!("{lhs}<={rhs}"),
            Operator::GreaterThan => format!("{lhs}>{rhs}"),
            Operator::GreaterThanEqual => format!("{lhs}>={rhs}"),
            Operator::Like
            | Operator::StartingWith
            | Operator::EndingWith
            | Operator::Containing => format!("{lhs} LIKE {rhs}"),
            Operator::NotLike | Operator::NotContaining => format!("{lhs} NOT LIKE {rhs}"),
            Operator::In => format!("{lhs} IN UNNEST({rhs})"),
            Operator::NotIn => format!("{lhs} NOT IN UNNEST({rhs})"),
            Operator::Regex => format!("REGEXP_CONTAINS({lhs},{rhs})"),
            Operator::True => format!("{lhs}=TRUE"),
            Operator::False => format!("{lhs}=FALSE"),
            _ => return None,
        };
        Some(sql)
    }

    /// Split a clause into its property part and operator.
    ///
    /// The longest keyword the clause ends with wins, as long as it leaves a non-empty
    /// property in front of it; a clause with no keyword is a plain equality.
    pub fn detect(clause: &str) -> (&str, Operator) {
        let mut best: Option<(&'static str, Operator)> = None;
        for op in Operator::ALL {
            for keyword in op.keywords() {
                if clause.len() > keyword.len()
                    && clause.ends_with(keyword)
                    && best.map_or(true, |(k, _)| keyword.len() > k.len())
                {
                    best = Some((keyword, op));
                }
            }
        }
        match best {
            Some((keyword, op)) => (&clause[..clause.len() - keyword.len()], op),
            None => (clause, Operator::SimpleProperty),
        }
    }
}

/// Case-folding mode of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IgnoreCase {
    #[default]
    Never,
    /// Declared on the clause itself (`...IgnoreCase`)
    Always,
    /// Inherited from `AllIgnoreCase`; applied to string columns only
    WhenPossible,
}

/// One parsed clause of a derived-query method name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyCondition {
    pub path: PropertyPath,
    pub operator: Operator,
    pub ignore_case: IgnoreCase,
    /// Clause text as written in the method name
    pub source: String,
}

impl PropertyCondition {
    /// Parameters required by the operator; leaves with zero still own a tag.
    pub fn parameter_count(&self) -> usize {
        self.operator.arity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_longest_keyword() {
        assert_eq!(Operator::detect("IdIsNotNull"), ("Id", Operator::IsNotNull));
        assert_eq!(Operator::detect("IdNotNull"), ("Id", Operator::IsNotNull));
        assert_eq!(Operator::detect("TraderIdIsNull"), ("TraderId", Operator::IsNull));
        assert_eq!(
            Operator::detect("PriceLessThanEqual"),
            ("Price", Operator::LessThanEqual)
        );
        assert_eq!(
            Operator::detect("PriceGreaterThan"),
            ("Price", Operator::GreaterThan)
        );
        assert_eq!(Operator::detect("SymbolNotLike"), ("Symbol", Operator::NotLike));
        assert_eq!(
            Operator::detect("SymbolNotContains"),
            ("Symbol", Operator::NotContaining)
        );
        assert_eq!(Operator::detect("PriceIn"), ("Price", Operator::In));
        assert_eq!(Operator::detect("PriceNotIn"), ("Price", Operator::NotIn));
        assert_eq!(Operator::detect("TraderIdBetween"), ("TraderId", Operator::Between));
    }

    #[test]
    fn test_detect_defaults_to_equality() {
        assert_eq!(Operator::detect("Action"), ("Action", Operator::SimpleProperty));
        assert_eq!(Operator::detect("ActionIs"), ("Action", Operator::SimpleProperty));
        assert_eq!(Operator::detect("ActionNot"), ("Action", Operator::NegatingSimpleProperty));
    }

    #[test]
    fn test_keyword_alone_is_a_property() {
        // "In" with nothing in front of it cannot be an operator.
        assert_eq!(Operator::detect("In"), ("In", Operator::SimpleProperty));
    }

    #[test]
    fn test_arity() {
        assert_eq!(Operator::SimpleProperty.arity(), 1);
        assert_eq!(Operator::IsNull.arity(), 0);
        assert_eq!(Operator::True.arity(), 0);
        assert_eq!(Operator::In.arity(), 1);
        assert_eq!(Operator::Between.arity(), 2);
    }

    #[test]
    fn test_render() {
        assert_eq!(Operator::SimpleProperty.render("action", "@tag0").unwrap(), "action=@tag0");
        assert_eq!(Operator::IsNotNull.render("id", "@tag5").unwrap(), "id<>NULL");
        assert_eq!(Operator::In.render("price", "@tag12").unwrap(), "price IN UNNEST(@tag12)");
        assert_eq!(
            Operator::Containing.render("ticker", "@tag0").unwrap(),
            "ticker LIKE @tag0"
        );
        assert!(Operator::Between.render("trader_id", "@tag0").is_none());
    }

    #[test]
    fn test_render_negated_and_regex() {
        assert_eq!(
            Operator::NegatingSimpleProperty.render("action", "@tag0").unwrap(),
            "action<>@tag0"
        );
        assert_eq!(Operator::Like.render("ticker", "@tag1").unwrap(), "ticker LIKE @tag1");
        assert_eq!(
            Operator::NotLike.render("ticker", "@tag1").unwrap(),
            "ticker NOT LIKE @tag1"
        );
        assert_eq!(
            Operator::NotContaining.render("ticker", "@tag2").unwrap(),
            "ticker NOT LIKE @tag2"
        );
        assert_eq!(
            Operator::NotIn.render("price", "@tag3").unwrap(),
            "price NOT IN UNNEST(@tag3)"
        );
        assert_eq!(
            Operator::Regex.render("ticker", "@tag4").unwrap(),
            "REGEXP_CONTAINS(ticker,@tag4)"
        );
    }

    #[test]
    fn test_like_patterns() {
        assert_eq!(Operator::Containing.like_pattern().unwrap().apply("BU"), "%BU%");
        assert_eq!(Operator::StartingWith.like_pattern().unwrap().apply("BU"), "BU%");
        assert_eq!(Operator::EndingWith.like_pattern().unwrap().apply("UY"), "%UY");
        assert_eq!(Operator::NotContaining.like_pattern().unwrap().apply("BU"), "%BU%");
        assert!(Operator::NotLike.like_pattern().is_none());
        assert!(Operator::Like.like_pattern().is_none());
    }

    #[test]
    fn test_every_supported_operator_renders() {
        for op in Operator::ALL {
            assert_eq!(op.render("c", "@t").is_some(), op.is_supported(), "{op:?}");
        }
    }
}
