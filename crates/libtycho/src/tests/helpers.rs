//! Test utilities: an AST builder standing in for the external parser, a
//! map-backed [`SourceParser`] and the standard-library stubs every package
//! implicitly imports.

use indexmap::IndexMap;

use crate::{
    ast::*,
    context::CompilerContext,
    error::CompilerError,
    pkg::{ImportResolver, PackageId, ResolverConfig, SourceParser},
    file::SourceFile,
    span::Span,
};

/// Builds the trees a parser would hand over. All builders of one test share
/// an indexer so node indices stay process-unique.
#[derive(Clone)]
pub struct AstBuilder {
    pub indexer: AstIndexer,
    pub file: SourceFile,
}

impl AstBuilder {
    pub fn new(indexer: AstIndexer, path: &str) -> Self {
        let components = path.split('/').map(str::to_string).collect();
        Self {
            indexer,
            file: SourceFile::new(components, format!("<test source {path}>")),
        }
    }

    pub fn span(&self) -> Span {
        Span::new(0..1, self.file.clone())
    }

    pub fn expr(&self, kind: ExpressionKind) -> ExpressionAst {
        ExpressionAst::new(self.indexer.next(), kind, self.span())
    }

    pub fn stmt(&self, kind: StatementKind) -> StatementAst {
        StatementAst::new(self.indexer.next(), kind, self.span())
    }

    pub fn int(&self, value: i64) -> ExpressionAst {
        self.expr(ExpressionKind::Primitive(PrimitiveValue::Int(value)))
    }

    pub fn float(&self, value: f64) -> ExpressionAst {
        self.expr(ExpressionKind::Primitive(PrimitiveValue::Float(value)))
    }

    pub fn boolean(&self, value: bool) -> ExpressionAst {
        self.expr(ExpressionKind::Primitive(PrimitiveValue::Bool(value)))
    }

    pub fn ident(&self, name: &str) -> ExpressionAst {
        self.expr(ExpressionKind::Ident(name.to_string()))
    }

    pub fn binary(&self, op: BinaryOperator, left: ExpressionAst, right: ExpressionAst) -> ExpressionAst {
        self.expr(ExpressionKind::Binary { op, left: Box::new(left), right: Box::new(right) })
    }

    pub fn assign(&self, target: ExpressionAst, value: ExpressionAst) -> ExpressionAst {
        self.expr(ExpressionKind::Assign { target: Box::new(target), value: Box::new(value) })
    }

    pub fn call(&self, callee: ExpressionAst, arguments: Vec<ExpressionAst>) -> ExpressionAst {
        self.expr(ExpressionKind::Call { callee: Box::new(callee), type_args: Vec::new(), arguments })
    }

    pub fn call_generic(&self, callee: ExpressionAst, type_args: Vec<TypeNameAst>, arguments: Vec<ExpressionAst>) -> ExpressionAst {
        self.expr(ExpressionKind::Call { callee: Box::new(callee), type_args, arguments })
    }

    pub fn member(&self, object: ExpressionAst, member: &str) -> ExpressionAst {
        self.expr(ExpressionKind::Member { object: Box::new(object), member: member.to_string() })
    }

    pub fn yield_(&self, value: Option<ExpressionAst>) -> ExpressionAst {
        self.expr(ExpressionKind::Yield(value.map(Box::new)))
    }

    pub fn let_(&self, name: &str, type_name: Option<TypeNameAst>, value: ExpressionAst) -> StatementAst {
        let span = self.span();
        self.stmt(StatementKind::Variable(VariableDefinitionAst {
            name: name.to_string(),
            type_name,
            value: Some(value),
            span,
        }))
    }

    pub fn expr_stmt(&self, expression: ExpressionAst) -> StatementAst {
        self.stmt(StatementKind::Expression(expression))
    }

    pub fn ret(&self, value: Option<ExpressionAst>) -> StatementAst {
        self.stmt(StatementKind::Return(value))
    }

    pub fn argument(&self, name: &str, type_name: TypeNameAst) -> FunctionArgumentAst {
        FunctionArgumentAst {
            name: name.to_string(),
            type_name,
            span: self.span(),
        }
    }

    pub fn function(&self, name: &str, arguments: Vec<FunctionArgumentAst>, return_type: TypeNameAst, body: Vec<StatementAst>) -> DeclarationAst {
        self.function_generic(name, Vec::new(), arguments, return_type, body)
    }

    pub fn function_generic(
        &self,
        name: &str,
        generics: Vec<GenericParameterAst>,
        arguments: Vec<FunctionArgumentAst>,
        return_type: TypeNameAst,
        body: Vec<StatementAst>,
    ) -> DeclarationAst {
        DeclarationAst::Function(std::rc::Rc::new(FunctionDefinitionAst {
            index: self.indexer.next(),
            name: name.to_string(),
            generics,
            arguments,
            return_type,
            body,
            is_local: false,
            span: self.span(),
        }))
    }

    pub fn class(&self, name: &str, attributes: Vec<ClassAttributeAst>, methods: Vec<ClassMethodAst>) -> DeclarationAst {
        DeclarationAst::Class(std::rc::Rc::new(ClassDefinitionAst {
            index: self.indexer.next(),
            name: name.to_string(),
            generics: Vec::new(),
            implements: Vec::new(),
            attributes,
            methods,
            static_block: None,
            is_local: false,
            span: self.span(),
        }))
    }

    pub fn attribute(&self, name: &str, type_name: TypeNameAst) -> ClassAttributeAst {
        ClassAttributeAst {
            name: name.to_string(),
            type_name,
            is_static: false,
            span: self.span(),
        }
    }

    pub fn method(&self, name: &str, arguments: Vec<FunctionArgumentAst>, return_type: TypeNameAst, body: Vec<StatementAst>) -> ClassMethodAst {
        ClassMethodAst {
            function: FunctionDefinitionAst {
                index: self.indexer.next(),
                name: name.to_string(),
                generics: Vec::new(),
                arguments,
                return_type,
                body,
                is_local: false,
                span: self.span(),
            },
            is_static: false,
            is_override: false,
        }
    }

    pub fn variant(&self, name: &str, cases: Vec<(&str, Vec<FunctionArgumentAst>)>) -> DeclarationAst {
        DeclarationAst::Variant(std::rc::Rc::new(VariantDefinitionAst {
            index: self.indexer.next(),
            name: name.to_string(),
            generics: Vec::new(),
            cases: cases
                .into_iter()
                .map(|(case, parameters)| VariantCaseAst {
                    name: case.to_string(),
                    parameters,
                    span: self.span(),
                })
                .collect(),
            is_local: false,
            span: self.span(),
        }))
    }

    pub fn type_alias(&self, name: &str, target: TypeNameAst) -> DeclarationAst {
        DeclarationAst::TypeAlias(std::rc::Rc::new(TypeAliasAst {
            index: self.indexer.next(),
            name: name.to_string(),
            generics: Vec::new(),
            target,
            is_local: false,
            span: self.span(),
        }))
    }

    pub fn import(&self, base_path: &[&str], actual_name: &str, alias: Option<&str>) -> ImportAst {
        ImportAst {
            index: self.indexer.next(),
            base_path: base_path.iter().map(|segment| segment.to_string()).collect(),
            actual_name: actual_name.to_string(),
            alias: alias.map(str::to_string),
            sub_imports: Vec::new(),
            span: self.span(),
        }
    }

    pub fn file_ast(&self, imports: Vec<ImportAst>, declarations: Vec<DeclarationAst>, statements: Vec<StatementAst>) -> FileAst {
        FileAst {
            file: self.file.clone(),
            imports,
            declarations,
            statements,
        }
    }
}

/// A parser that serves pre-built trees by path.
pub struct MapParser {
    pub files: IndexMap<String, FileAst>,
}

impl SourceParser for MapParser {
    fn parse(&mut self, path: &str, _source: &str) -> Result<FileAst, CompilerError> {
        match self.files.get(path) {
            Some(ast) => Ok(ast.clone()),
            None => Err(CompilerError::import_not_found(path, &Span::synthetic())),
        }
    }
}

/// The standard-library stubs the resolver injects into every package.
pub fn std_files(indexer: &AstIndexer) -> Vec<(String, FileAst)> {
    let string_builder = AstBuilder::new(indexer.clone(), "std/string");
    let string_file = string_builder.file_ast(
        Vec::new(),
        vec![string_builder.class("String", Vec::new(), Vec::new())],
        Vec::new(),
    );

    let iterator_builder = AstBuilder::new(indexer.clone(), "std/iterator");
    let iterator_file = iterator_builder.file_ast(
        Vec::new(),
        vec![DeclarationAst::Interface(std::rc::Rc::new(InterfaceDefinitionAst {
            index: iterator_builder.indexer.next(),
            name: "ArrayIterator".to_string(),
            generics: Vec::new(),
            methods: Vec::new(),
            is_local: false,
            span: iterator_builder.span(),
        }))],
        Vec::new(),
    );

    let runtime_builder = AstBuilder::new(indexer.clone(), "std/runtime");
    let runtime_file = runtime_builder.file_ast(
        Vec::new(),
        vec![runtime_builder.function("toArgVector", Vec::new(), TypeNameAst::named("void"), Vec::new())],
        Vec::new(),
    );

    vec![
        ("std/string.tc".to_string(), string_file),
        ("std/iterator.tc".to_string(), iterator_file),
        ("std/runtime.tc".to_string(), runtime_file),
    ]
}

/// Compiles a set of in-memory files plus the standard-library stubs.
pub fn compile_project(
    indexer: &AstIndexer,
    files: Vec<(&str, FileAst)>,
    entry: &[&str],
) -> Result<(CompilerContext, PackageId), CompilerError> {
    let mut ctx = CompilerContext::default();
    let package = compile_into(&mut ctx, indexer, files, entry)?;
    Ok((ctx, package))
}

/// Like [`compile_project`], against a caller-owned context.
pub fn compile_into(
    ctx: &mut CompilerContext,
    indexer: &AstIndexer,
    files: Vec<(&str, FileAst)>,
    entry: &[&str],
) -> Result<PackageId, CompilerError> {
    let mut parser_files = IndexMap::new();
    for (path, ast) in std_files(indexer) {
        parser_files.insert(path, ast);
    }
    for (path, ast) in files {
        parser_files.insert(path.to_string(), ast);
    }

    let mut resolver = ImportResolver::new(MapParser { files: parser_files.clone() }, ResolverConfig::default());
    for path in parser_files.keys() {
        resolver = resolver.with_source(path.clone(), String::new());
    }

    let segments: Vec<String> = entry.iter().map(|segment| segment.to_string()).collect();
    resolver.compile(ctx, &segments)
}

/// Shorthand for a single-file project rooted at `main.tc`.
pub fn compile_main(indexer: &AstIndexer, main: FileAst) -> Result<(CompilerContext, PackageId), CompilerError> {
    compile_project(indexer, vec![("main.tc", main)], &["main"])
}
