//! Lexical tokens for QubecTalk (spec §6).

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    String(String),
    Number(String),
    Keyword(Keyword),
    Symbol(Symbol),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    Percent,
}

macro_rules! keywords {
    ($($variant:ident => $text:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Keyword {
            $($variant),*
        }

        impl Keyword {
            pub fn from_word(word: &str) -> Option<Keyword> {
                match word {
                    $($text => Some(Keyword::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text,)*
                }
            }
        }
    };
}

keywords! {
    Start => "start",
    End => "end",
    About => "about",
    Variables => "variables",
    Default => "default",
    Policy => "policy",
    Simulations => "simulations",
    Simulate => "simulate",
    Using => "using",
    Then => "then",
    From => "from",
    Years => "years",
    Year => "year",
    To => "to",
    Onwards => "onwards",
    Beginning => "beginning",
    Across => "across",
    Trials => "trials",
    Define => "define",
    Modify => "modify",
    Application => "application",
    Uses => "uses",
    Substance => "substance",
    Enable => "enable",
    Initial => "initial",
    Charge => "charge",
    With => "with",
    For => "for",
    Equals => "equals",
    Set => "set",
    Change => "change",
    By => "by",
    Retire => "retire",
    Recharge => "recharge",
    Cap => "cap",
    Floor => "floor",
    Displacing => "displacing",
    Replace => "replace",
    Of => "of",
    Recover => "recover",
    Reuse => "reuse",
    At => "at",
    Eol => "eol",
    During => "during",
    As => "as",
    Get => "get",
    Limit => "limit",
    Min => "min",
    Max => "max",
    If => "if",
    Else => "else",
    Endif => "endif",
    And => "and",
    Or => "or",
    Xor => "xor",
    Sample => "sample",
    Normally => "normally",
    Uniformly => "uniformly",
    Mean => "mean",
    Std => "std",
    Variable => "variable",
}
