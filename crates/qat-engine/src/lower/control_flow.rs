//! Loop bookkeeping for `break` and `continue`

use crate::ir::BasicBlockId;
use crate::span::Identifier;

/// Targets of `break` and `continue` inside one loop
#[derive(Debug, Clone)]
pub struct LoopContext {
    /// Block to jump to for `break`
    pub break_block: BasicBlockId,
    /// Block to jump to for `continue`
    pub continue_block: BasicBlockId,
    pub tag: Option<Identifier>,
}

impl LoopContext {
    pub fn tagged(
        break_block: BasicBlockId,
        continue_block: BasicBlockId,
        tag: Option<Identifier>,
    ) -> Self {
        Self {
            break_block,
            continue_block,
            tag,
        }
    }
}

/// Stack of active loops, innermost last
#[derive(Debug, Default)]
pub struct LoopStack {
    stack: Vec<LoopContext>,
}

impl LoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ctx: LoopContext) {
        self.stack.push(ctx);
    }

    pub fn pop(&mut self) -> Option<LoopContext> {
        self.stack.pop()
    }

    pub fn current(&self) -> Option<&LoopContext> {
        self.stack.last()
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&LoopContext> {
        self.stack
            .iter()
            .rev()
            .find(|ctx| ctx.tag.as_ref().is_some_and(|t| t.value == tag))
    }

    pub fn break_target(&self, tag: Option<&str>) -> Option<BasicBlockId> {
        match tag {
            Some(t) => self.find_by_tag(t).map(|ctx| ctx.break_block),
            None => self.current().map(|ctx| ctx.break_block),
        }
    }

    pub fn continue_target(&self, tag: Option<&str>) -> Option<BasicBlockId> {
        match tag {
            Some(t) => self.find_by_tag(t).map(|ctx| ctx.continue_block),
            None => self.current().map(|ctx| ctx.continue_block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileRange;

    #[test]
    fn test_loop_stack() {
        let mut stack = LoopStack::new();
        assert!(stack.current().is_none());

        stack.push(LoopContext::tagged(
            BasicBlockId(3),
            BasicBlockId(4),
            Some(Identifier::new("outer", FileRange::default())),
        ));
        stack.push(LoopContext::tagged(BasicBlockId(1), BasicBlockId(2), None));
        assert_eq!(stack.break_target(None), Some(BasicBlockId(1)));
        assert_eq!(stack.continue_target(None), Some(BasicBlockId(2)));
        assert_eq!(stack.break_target(Some("outer")), Some(BasicBlockId(3)));
        assert_eq!(stack.continue_target(Some("inner")), None);

        stack.pop();
        stack.pop();
        assert!(stack.pop().is_none());
    }
}
