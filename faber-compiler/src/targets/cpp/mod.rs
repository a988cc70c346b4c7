//! C++ backend
//!
//! Targets C++20 (C++23 where `std::format`-era headers are assumed). Loose
//! statements are hoisted into `int main`. Tagged unions are `std::variant`
//! over one struct per variant and pattern matching expands into
//! `std::visit` over an overload set. Resource scopes guarantee release with
//! `faber::ScopeGuard`; allocator scopes open a `std::pmr` memory resource.
//! The preamble carries exactly the headers and helpers the body used.

mod decl;
mod expr;
mod methods;
mod stmt;

use crate::backend::{
    CodegenBackend, CodegenDiagnostic, CodegenOptions, CompilationTarget, MemoryModel, Target,
};
use crate::context::{Features, GenerationContext, Scoped};
use crate::registry::MethodRegistry;
use crate::targets::{marker_diagnostics, ModuleLayout, StmtEmitter};
use crate::Result;
use faber_ast::{builtin, Stmt, TypeExpr, Unit};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

const FEATURES: &[&str] = &[
    "async",
    "closures",
    "pattern-matching",
    "resource-scopes",
    "format-strings",
    "collection-filters",
    "allocators",
];

/// Headers pulled in by each feature
const HEADERS: &[(Features, &[&str])] = &[
    (Features::MATH_CONSTANTS, &["<numbers>"]),
    (Features::STDIN, &["<iostream>", "<iterator>"]),
    (Features::SCOPE_GUARD, &["<utility>"]),
    (Features::VISITOR, &["<variant>"]),
    (Features::ASYNC, &["<future>"]),
    (Features::FORMAT, &["<format>"]),
    (Features::CONSOLE, &["<cstdlib>", "<iostream>"]),
    (Features::SEQUENCE, &["<vector>"]),
    (Features::MAP, &["<unordered_map>"]),
    (Features::SET, &["<unordered_set>"]),
    (Features::OPTIONAL, &["<optional>"]),
    (Features::VARIANT, &["<variant>"]),
    (Features::EXCEPTIONS, &["<stdexcept>"]),
    (Features::TYPING, &["<any>"]),
    (Features::MEMORY_RESOURCE, &["<memory_resource>"]),
    (Features::FUNCTIONAL, &["<functional>"]),
    (Features::ALGORITHM, &["<algorithm>", "<iterator>", "<ranges>"]),
    (Features::NUMERIC, &["<numeric>"]),
    (Features::TEXT, &["<algorithm>", "<cctype>", "<vector>"]),
    (Features::PARSE_HELPERS, &["<algorithm>", "<cctype>", "<optional>"]),
    (Features::ASSERT, &["<cassert>"]),
];

/// C++ code generator backend
pub struct CppBackend {
    registry: &'static MethodRegistry,
}

impl CppBackend {
    pub fn new() -> Result<Self> {
        Ok(CppBackend {
            registry: methods::registry()?,
        })
    }
}

impl CodegenBackend for CppBackend {
    fn target(&self) -> Target {
        Target::Cpp
    }

    fn target_info(&self) -> CompilationTarget {
        CompilationTarget {
            target: Target::Cpp,
            name: "C++".to_string(),
            file_extension: Target::Cpp.file_extension().to_string(),
            memory: MemoryModel::Manual,
            supports_async: true,
            supports_generators: false,
            supports_closures: true,
        }
    }

    fn supports_feature(&self, feature: &str) -> bool {
        FEATURES.contains(&feature)
    }

    fn generate_unit(&self, unit: &Unit, options: &CodegenOptions) -> Result<String> {
        debug!(unit = %unit.name, backend = "cpp", "generating unit");
        let mut emitter = CppEmitter::new(options.indent_for(Target::Cpp), self.registry);
        emitter.ctx.register_unions(&unit.body);
        emitter.register_types(&unit.body);

        let body = emitter.module(&unit.body)?;
        let preamble = if options.emit_preamble {
            emitter.preamble()
        } else {
            String::new()
        };
        debug!(
            unit = %unit.name,
            backend = "cpp",
            features = ?emitter.ctx.features(),
            "generated unit"
        );

        if preamble.is_empty() {
            Ok(body)
        } else if body.is_empty() {
            Ok(preamble)
        } else {
            Ok(format!("{preamble}\n{body}"))
        }
    }

    fn validate_output(&self, code: &str) -> Vec<CodegenDiagnostic> {
        marker_diagnostics(code, methods::MARKER)
    }
}

pub(crate) struct CppEmitter {
    ctx: GenerationContext,
    registry: &'static MethodRegistry,
    /// Classes, enums and unions declared in the unit; members resolve with `::`
    types: HashSet<String>,
    /// Member names of every enum declared in the unit
    enums: HashMap<String, Vec<String>>,
    /// Method names of every contract declared in the unit
    contracts: HashMap<String, Vec<String>>,
    /// Name of the suite whose tests are being emitted
    suite: Option<String>,
}

impl CppEmitter {
    fn new(indent: usize, registry: &'static MethodRegistry) -> Self {
        CppEmitter {
            ctx: GenerationContext::new(indent),
            registry,
            types: HashSet::new(),
            enums: HashMap::new(),
            contracts: HashMap::new(),
            suite: None,
        }
    }

    fn register_types(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Class(decl) => {
                    self.types.insert(decl.name.clone());
                }
                Stmt::Union(decl) => {
                    self.types.insert(decl.name.clone());
                }
                Stmt::Enum(decl) => {
                    self.types.insert(decl.name.clone());
                    let members = decl.members.iter().map(|m| m.name.clone()).collect();
                    self.enums.insert(decl.name.clone(), members);
                }
                Stmt::Interface(decl) => {
                    let methods = decl.methods.iter().map(|m| m.name.clone()).collect();
                    self.contracts.insert(decl.name.clone(), methods);
                }
                Stmt::TestSuite { body, .. } => self.register_types(body),
                _ => {}
            }
        }
    }

    /// Declarations, then `int main` holding everything else
    fn module(&mut self, stmts: &[Stmt]) -> Result<String> {
        let layout = ModuleLayout::split(stmts);
        let mut out = self.items(&layout.items)?;
        if !layout.needs_main() {
            return Ok(out);
        }
        if !out.is_empty() {
            out.push('\n');
        }
        let main = &layout.main;
        if main.is_empty() {
            out.push_str(&self.ctx.line("int main() {}"));
            return Ok(out);
        }
        out.push_str(&self.ctx.line("int main() {"));
        out.push_str(&self.in_function(false, false, |this| {
            this.indented(|this| {
                let mut body = String::new();
                for stmt in main {
                    body.push_str(&this.stmt(stmt)?);
                }
                Ok(body)
            })
        })?);
        out.push_str(&self.ctx.line("}"));
        Ok(out)
    }

    pub(crate) fn render_type(&mut self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Named { name, args } => {
                let mut args: Vec<String> = args.iter().map(|arg| self.render_type(arg)).collect();
                match name.as_str() {
                    builtin::TEXT => "std::string".to_string(),
                    builtin::NUMBER => "int64_t".to_string(),
                    builtin::FLOAT => "double".to_string(),
                    builtin::BOOL => "bool".to_string(),
                    builtin::NIL | builtin::VOID => "void".to_string(),
                    builtin::BYTES => {
                        self.ctx.require(Features::SEQUENCE);
                        "std::vector<uint8_t>".to_string()
                    }
                    builtin::UNKNOWN | builtin::ANY => self.any_type(),
                    builtin::LIST => {
                        self.ctx.require(Features::SEQUENCE);
                        let element = args.pop().unwrap_or_else(|| self.any_type());
                        format!("std::vector<{element}>")
                    }
                    builtin::MAP => {
                        self.ctx.require(Features::MAP);
                        let value = args.pop().unwrap_or_else(|| self.any_type());
                        let key = args.pop().unwrap_or_else(|| "std::string".to_string());
                        format!("std::unordered_map<{key}, {value}>")
                    }
                    builtin::SET => {
                        self.ctx.require(Features::SET);
                        let element = args.pop().unwrap_or_else(|| self.any_type());
                        format!("std::unordered_set<{element}>")
                    }
                    other if args.is_empty() => other.to_string(),
                    other => format!("{}<{}>", other, args.join(", ")),
                }
            }
            TypeExpr::Nullable { inner } => {
                self.ctx.require(Features::OPTIONAL);
                format!("std::optional<{}>", self.render_type(inner))
            }
            TypeExpr::Function { params, ret } => {
                self.ctx.require(Features::FUNCTIONAL);
                let params: Vec<String> = params.iter().map(|p| self.render_type(p)).collect();
                format!("std::function<{}({})>", self.render_type(ret), params.join(", "))
            }
            TypeExpr::Union { .. } => self.any_type(),
            TypeExpr::Literal { value } => {
                if value.starts_with('"') {
                    "std::string".to_string()
                } else if value == "verum" || value == "falsum" || value == "true" || value == "false" {
                    "bool".to_string()
                } else if value.contains('.') {
                    "double".to_string()
                } else {
                    "int64_t".to_string()
                }
            }
        }
    }

    fn any_type(&mut self) -> String {
        self.ctx.require(Features::TYPING);
        "std::any".to_string()
    }

    /// Includes and the `faber` helpers the body asked for
    fn preamble(&self) -> String {
        let features = self.ctx.features();
        let unit = " ".repeat(self.ctx.indent_width());
        let mut headers: BTreeSet<&str> = ["<cstdint>", "<string>"].into_iter().collect();
        for (feature, names) in HEADERS {
            if features.contains(*feature) {
                headers.extend(names.iter().copied());
            }
        }
        let mut out: String = headers
            .iter()
            .map(|header| format!("#include {header}\n"))
            .collect();

        let mut helpers = Vec::new();
        if features.contains(Features::SCOPE_GUARD) {
            helpers.push(format!(
                "template <typename F>\n\
                 class ScopeGuard {{\n\
                 public:\n\
                 {unit}explicit ScopeGuard(F release) : release_(std::move(release)) {{}}\n\
                 {unit}~ScopeGuard() {{ release_(); }}\n\
                 {unit}ScopeGuard(const ScopeGuard&) = delete;\n\
                 {unit}ScopeGuard& operator=(const ScopeGuard&) = delete;\n\
                 \n\
                 private:\n\
                 {unit}F release_;\n\
                 }};\n"
            ));
        }
        if features.contains(Features::VISITOR) {
            helpers.push(format!(
                "template <typename... Ts>\n\
                 struct overloaded : Ts... {{\n\
                 {unit}using Ts::operator()...;\n\
                 }};\n"
            ));
        }
        if features.contains(Features::TEXT) {
            helpers.push(format!(
                "inline std::string upper(std::string text) {{\n\
                 {unit}std::transform(text.begin(), text.end(), text.begin(), [](unsigned char c) {{ return std::toupper(c); }});\n\
                 {unit}return text;\n\
                 }}\n\
                 \n\
                 inline std::string lower(std::string text) {{\n\
                 {unit}std::transform(text.begin(), text.end(), text.begin(), [](unsigned char c) {{ return std::tolower(c); }});\n\
                 {unit}return text;\n\
                 }}\n\
                 \n\
                 inline std::string trim(const std::string& text) {{\n\
                 {unit}const auto first = text.find_first_not_of(\" \\t\\r\\n\");\n\
                 {unit}if (first == std::string::npos) return \"\";\n\
                 {unit}const auto last = text.find_last_not_of(\" \\t\\r\\n\");\n\
                 {unit}return text.substr(first, last - first + 1);\n\
                 }}\n\
                 \n\
                 inline std::vector<std::string> split(const std::string& text, const std::string& separator) {{\n\
                 {unit}std::vector<std::string> parts;\n\
                 {unit}std::size_t start = 0;\n\
                 {unit}for (auto at = text.find(separator); at != std::string::npos; at = text.find(separator, start)) {{\n\
                 {unit}{unit}parts.push_back(text.substr(start, at - start));\n\
                 {unit}{unit}start = at + separator.size();\n\
                 {unit}}}\n\
                 {unit}parts.push_back(text.substr(start));\n\
                 {unit}return parts;\n\
                 }}\n\
                 \n\
                 inline std::string replace_all(std::string text, const std::string& from, const std::string& to) {{\n\
                 {unit}for (auto at = text.find(from); !from.empty() && at != std::string::npos; at = text.find(from, at + to.size())) {{\n\
                 {unit}{unit}text.replace(at, from.size(), to);\n\
                 {unit}}}\n\
                 {unit}return text;\n\
                 }}\n\
                 \n\
                 inline std::string join(const std::vector<std::string>& parts, const std::string& separator) {{\n\
                 {unit}std::string out;\n\
                 {unit}for (std::size_t i = 0; i < parts.size(); ++i) {{\n\
                 {unit}{unit}if (i > 0) out += separator;\n\
                 {unit}{unit}out += parts[i];\n\
                 {unit}}}\n\
                 {unit}return out;\n\
                 }}\n"
            ));
        }
        if features.contains(Features::PARSE_HELPERS) {
            helpers.push(format!(
                "inline bool digits_only(const std::string& text) {{\n\
                 {unit}return !text.empty() && std::all_of(text.begin(), text.end(), [](unsigned char c) {{ return std::isdigit(c); }});\n\
                 }}\n\
                 \n\
                 inline bool digits_or_point(const std::string& text) {{\n\
                 {unit}return !text.empty() && std::all_of(text.begin(), text.end(), [](unsigned char c) {{ return std::isdigit(c) || c == '.'; }});\n\
                 }}\n\
                 \n\
                 inline std::optional<int64_t> parse_int(const std::string& text, int base) {{\n\
                 {unit}try {{ return std::stoll(text, nullptr, base); }} catch (...) {{ return std::nullopt; }}\n\
                 }}\n\
                 \n\
                 inline std::optional<double> parse_float(const std::string& text) {{\n\
                 {unit}try {{ return std::stod(text); }} catch (...) {{ return std::nullopt; }}\n\
                 }}\n"
            ));
        }
        if !helpers.is_empty() {
            out.push_str("\nnamespace faber {\n\n");
            out.push_str(&helpers.join("\n"));
            out.push_str("\n}  // namespace faber\n");
        }

        if features.contains(Features::STDIN) {
            out.push_str(&format!(
                "\n\
                 inline std::string __lege() {{\n\
                 {unit}return std::string(std::istreambuf_iterator<char>(std::cin), std::istreambuf_iterator<char>());\n\
                 }}\n\
                 \n\
                 inline std::string __lege_lineam() {{\n\
                 {unit}std::string line;\n\
                 {unit}std::getline(std::cin, line);\n\
                 {unit}return line;\n\
                 }}\n"
            ));
        }
        out
    }
}

impl Scoped for CppEmitter {
    fn context(&mut self) -> &mut GenerationContext {
        &mut self.ctx
    }
}

impl StmtEmitter for CppEmitter {
    fn stmt(&mut self, stmt: &Stmt) -> Result<String> {
        self.emit_stmt(stmt)
    }
}
