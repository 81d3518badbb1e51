use crate::Category;

peg::parser!(pub grammar parser() for str {

    // names joined by `,`, `|` or `or`
    pub rule categories() -> Category
        = _ cs:(category() ++ separator()) _ {
            cs.into_iter().fold(Category::empty(), |acc, c| acc | c)
        }

    rule category() -> Category
        = snat() / dnat() / routed() / local() / nat() / all()

    rule snat() -> Category
        = "snat" word_end() { Category::SNAT }

    rule dnat() -> Category
        = "dnat" word_end() { Category::DNAT }

    rule routed() -> Category
        = "routed" word_end() { Category::ROUTED }

    rule local() -> Category
        = "local" word_end() { Category::LOCAL }

    rule nat() -> Category
        = "nat" word_end() { Category::NAT }

    rule all() -> Category
        = "all" word_end() { Category::all() }

    rule separator()
        = _ ("," / "|" / "or" word_end()) _

    rule word_end()
        = !['a'..='z' | 'A'..='Z' | '0'..='9' | '_']

    rule _() =  quiet!{[' ' | '\t']*}
});
