//! Line-oriented script output with block indentation.

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct ScriptWriter {
    output: String,
    level: usize,
}

impl ScriptWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, line: &str) {
        for _ in 0..self.level {
            self.output.push_str(INDENT);
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    /// Emit a line that opens a block
    pub fn open(&mut self, line: &str) {
        self.emit(line);
        self.level += 1;
    }

    /// Emit a line that closes a block
    pub fn close(&mut self, line: &str) {
        self.level = self.level.saturating_sub(1);
        self.emit(line);
    }

    /// Emit a line that closes one block and opens the next, like `} else {`
    pub fn reopen(&mut self, line: &str) {
        self.close(line);
        self.level += 1;
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn finish(self) -> String {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut w = ScriptWriter::new();
        w.open("if (v0) {");
        w.emit("f();");
        w.reopen("} else {");
        w.emit("g();");
        w.close("}");
        assert_eq!(w.level(), 0);
        assert_eq!(w.finish(), "if (v0) {\n    f();\n} else {\n    g();\n}\n");
    }

    #[test]
    fn test_unbalanced_close_stays_at_zero() {
        let mut w = ScriptWriter::new();
        w.close("}");
        assert_eq!(w.finish(), "}\n");
    }
}
