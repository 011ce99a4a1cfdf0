use std::collections::{BTreeSet, HashMap};
use log::info;
use crate::device::Kernel;
use crate::error::{Error, Result};
use crate::grid::{GridDescriptor, NUM_GHOST};




/**
 * The kernel library available to `#include`. Every file is embedded in the
 * binary, so building a program never touches the file system.
 */
fn library_file(name: &str) -> Option<&'static str> {
    match name {
        "Common.cl"      => Some(include_str!("../kernels/Common.cl")),
        "SlopeLimiter.cl" => Some(include_str!("../kernels/SlopeLimiter.cl")),
        "Roe.cl"         => Some(include_str!("../kernels/Roe.cl")),
        "Burgers.cl"     => Some(include_str!("../kernels/Burgers.cl")),
        "Euler.cl"       => Some(include_str!("../kernels/Euler.cl")),
        "MHD.cl"         => Some(include_str!("../kernels/MHD.cl")),
        "Maxwell.cl"     => Some(include_str!("../kernels/Maxwell.cl")),
        "SRHD.cl"        => Some(include_str!("../kernels/SRHD.cl")),
        "ADM3D.cl"       => Some(include_str!("../kernels/ADM3D.cl")),
        "SelfGravity.cl" => Some(include_str!("../kernels/SelfGravity.cl")),
        "DivFree.cl"     => Some(include_str!("../kernels/DivFree.cl")),
        _ => None,
    }
}

const MAX_INCLUDE_DEPTH: usize = 16;




/**
 * Format a real number as a source literal which always carries a decimal
 * point or an exponent.
 */
fn real_literal(x: f64) -> String {
    format!("{:?}", x)
}

/// Shorthand for the `#include` line of a library file.
pub fn include(file: &str) -> String {
    format!("#include \"{}\"\n", file)
}




/**
 * The text of a device program, as an ordered list of compilation units
 * which are built as one. Assembly is pure: the same inputs always produce
 * byte-identical source.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    units: Vec<String>,
}




// ============================================================================
impl ProgramSource {

    /**
     * Start a program with the macro header describing the grid, followed
     * by the slope limiter library and the common source.
     */
    pub fn new(grid: &GridDescriptor, num_states: usize, slope_limiter: &str, gravitational_constant: f64) -> Self {
        let size = grid.size();
        let dx = grid.cell_spacing();
        let xmin = grid.xmin();
        let xmax = grid.xmax();

        let mut header = String::new();
        header += "#define real double\n";
        header += &format!("#define DIM {}\n", grid.dim());
        header += &format!("#define SIZE_X {}\n", size[0]);
        header += &format!("#define SIZE_Y {}\n", size[1]);
        header += &format!("#define SIZE_Z {}\n", size[2]);
        header += "#define STEP_X 1\n";
        header += &format!("#define STEP_Y {}\n", size[0]);
        header += &format!("#define STEP_Z {}\n", size[0] * size[1]);
        header += &format!("#define STEP_W {}\n", size[0] * size[1] * size[2]);
        header += &format!("#define DX {}\n", real_literal(dx[0]));
        header += &format!("#define DY {}\n", real_literal(dx[1]));
        header += &format!("#define DZ {}\n", real_literal(dx[2]));
        header += &format!("#define XMIN {}\n", real_literal(xmin[0]));
        header += &format!("#define YMIN {}\n", real_literal(xmin[1]));
        header += &format!("#define ZMIN {}\n", real_literal(xmin[2]));
        header += &format!("#define XMAX {}\n", real_literal(xmax[0]));
        header += &format!("#define YMAX {}\n", real_literal(xmax[1]));
        header += &format!("#define ZMAX {}\n", real_literal(xmax[2]));
        header += &format!("#define NUM_STATES {}\n", num_states);
        header += &format!("#define NUM_GHOST {}\n", NUM_GHOST);
        header += &format!("#define SLOPE_LIMITER_{}\n", slope_limiter);
        header += &format!("#define GRAVITATIONAL_CONSTANT {}\n", real_literal(gravitational_constant));

        Self {
            units: vec![header, include("SlopeLimiter.cl"), include("Common.cl")],
        }
    }

    pub fn push<S: Into<String>>(&mut self, unit: S) {
        self.units.push(unit.into())
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn text(&self) -> String {
        self.units.concat()
    }

    /**
     * Run the preprocessor over the whole program and collect its kernel
     * declarations. Any `#error`, unknown directive, missing include, or
     * unbalanced conditional fails the build, and the returned error
     * carries the build log.
     */
    pub fn build(&self) -> Result<Program> {
        let mut pp = Preprocessor::default();

        for (n, unit) in self.units.iter().enumerate() {
            pp.run(&format!("<unit {}>", n), unit, 0);
        }

        if pp.errors.is_empty() {
            let log = pp.warnings.join("\n");
            if !log.is_empty() {
                info!("{}", log);
            }
            Ok(Program {
                source: self.clone(),
                kernels: pp.kernels,
                defines: pp.defines,
                log,
            })
        } else {
            let mut lines = pp.errors;
            lines.extend(pp.warnings);
            Err(Error::Build { log: lines.join("\n") })
        }
    }
}




/**
 * A successfully built device program: the kernels it declares and the
 * macros in effect at the end of the build.
 */
#[derive(Clone, Debug)]
pub struct Program {
    source: ProgramSource,
    kernels: BTreeSet<String>,
    defines: HashMap<String, String>,
    log: String,
}




// ============================================================================
impl Program {

    /**
     * Return a handle to the named kernel, or a build error if the program
     * does not declare it.
     */
    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        if self.kernels.contains(name) {
            Ok(Kernel::new(name))
        } else {
            Err(Error::Build { log: format!("program has no kernel named {}", name) })
        }
    }

    pub fn has_kernel(&self, name: &str) -> bool {
        self.kernels.contains(name)
    }

    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.kernels.iter().map(String::as_str)
    }

    /// The value of a macro defined by the program, if any.
    pub fn define(&self, name: &str) -> Option<&str> {
        self.defines.get(name).map(String::as_str)
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    /// Warnings emitted while building.
    pub fn build_log(&self) -> &str {
        &self.log
    }
}




// ============================================================================
struct Conditional {
    enclosing_active: bool,
    taken: bool,
    seen_else: bool,
}

#[derive(Default)]
struct Preprocessor {
    defines: HashMap<String, String>,
    conditionals: Vec<Conditional>,
    kernels: BTreeSet<String>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl Preprocessor {

    fn active(&self) -> bool {
        self.conditionals.last().map_or(true, |c| c.enclosing_active && c.taken)
    }

    fn run(&mut self, file: &str, text: &str, depth: usize) {
        let depth_on_entry = self.conditionals.len();

        for (n, line) in strip_comments(text).lines().enumerate() {
            let at = format!("{}:{}", file, n + 1);
            let line = line.trim();

            if let Some(directive) = line.strip_prefix('#') {
                self.directive(&at, directive.trim(), depth);
            } else if self.active() {
                self.declaration(&at, line);
            }
        }

        if self.conditionals.len() != depth_on_entry {
            self.errors.push(format!("{}: error: unterminated conditional directive", file));
            self.conditionals.truncate(depth_on_entry);
        }
    }

    fn directive(&mut self, at: &str, directive: &str, depth: usize) {
        let (keyword, rest) = match directive.find(char::is_whitespace) {
            Some(i) => (&directive[..i], directive[i..].trim()),
            None => (directive, ""),
        };

        match keyword {
            "ifdef" | "ifndef" => {
                let defined = self.defines.contains_key(rest);
                let enclosing_active = self.active();
                let taken = if keyword == "ifdef" { defined } else { !defined };
                self.conditionals.push(Conditional { enclosing_active, taken, seen_else: false });
            }
            "else" => match self.conditionals.last_mut() {
                Some(c) if !c.seen_else => {
                    c.taken = !c.taken;
                    c.seen_else = true;
                }
                _ => self.errors.push(format!("{}: error: #else without #if", at)),
            },
            "endif" => {
                if self.conditionals.pop().is_none() {
                    self.errors.push(format!("{}: error: #endif without #if", at));
                }
            }
            _ if !self.active() => {}
            "define" => {
                let (name, value) = match rest.find(char::is_whitespace) {
                    Some(i) => (&rest[..i], rest[i..].trim()),
                    None => (rest, ""),
                };
                if name.is_empty() {
                    self.errors.push(format!("{}: error: macro name missing", at));
                } else {
                    self.defines.insert(name.to_string(), value.to_string());
                }
            }
            "undef" => {
                self.defines.remove(rest);
            }
            "include" => {
                let name = rest.trim_matches(|c| c == '"' || c == '<' || c == '>');
                if depth >= MAX_INCLUDE_DEPTH {
                    self.errors.push(format!("{}: error: #include nested too deeply", at));
                } else if let Some(text) = library_file(name) {
                    self.run(name, text, depth + 1);
                } else {
                    self.errors.push(format!("{}: fatal error: '{}' file not found", at, name));
                }
            }
            "error" => self.errors.push(format!("{}: error: {}", at, rest)),
            "warning" => self.warnings.push(format!("{}: warning: {}", at, rest)),
            "pragma" => {}
            _ => self.errors.push(format!("{}: error: invalid preprocessing directive #{}", at, keyword)),
        }
    }

    fn declaration(&mut self, at: &str, line: &str) {
        let rest = match line.strip_prefix("__kernel") {
            Some(rest) => rest.trim_start(),
            None => return,
        };
        let name = rest
            .strip_prefix("void")
            .map(|s| s.trim_start())
            .and_then(|s| s.split('(').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match name {
            Some(name) if !self.kernels.insert(name.to_string()) => {
                self.errors.push(format!("{}: error: redefinition of kernel '{}'", at, name))
            }
            Some(_) => {}
            None => self.errors.push(format!("{}: error: kernel must return void", at)),
        }
    }
}




/**
 * Remove block and line comments, keeping every newline so that line
 * numbers in diagnostics are preserved.
 */
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_block = false;

    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            } else if c == '\n' {
                out.push('\n');
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            in_block = true;
        } else if c == '/' && chars.peek() == Some(&'/') {
            while let Some(&d) = chars.peek() {
                if d == '\n' {
                    break;
                }
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}
