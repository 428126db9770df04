//! Recursive-descent parser (§4.2).
//!
//! Grammar precedence is fixed: preprocessor fold before include before
//! type/interface/contract blocks before statement/expression forms; within
//! expressions, struct-initialiser, method/event/error signature,
//! interface-call, function-call, literal, then identifier. Backtracking
//! happens at exactly two points: `MemberAssignment` vs `MemberIdentifier`
//! (look for `:=`/`|=`), and `FunctionCall` vs bare `Identifier` (look for
//! `(`).

use std::rc::Rc;

use crate::{
    ast::*,
    error::{Error, SourceSpan},
    lexer::{self, TokKind, Token},
};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    filename: Rc<str>,
    pub docs: std::collections::BTreeMap<u32, String>,
}

type PResult<T> = Result<T, Error>;

impl Parser {
    pub fn parse_str(src: &str, filename: &str) -> PResult<Root> {
        let filename: Rc<str> = Rc::from(filename);
        let (blanked, docs) = lexer::strip_comments(src, &filename)?;
        let tokens = lexer::tokenize(&blanked, &filename)?;
        let mut parser = Self {
            tokens,
            pos: 0,
            filename,
            docs,
        };
        parser.parse_root()
    }

    fn span(&self, tok: &Token) -> SourceSpan {
        SourceSpan::new(self.filename.clone(), tok.line, tok.column)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_eof(&self) -> bool {
        self.peek().kind == TokKind::Eof
    }

    fn err_here(&self, msg: impl Into<String>) -> Error {
        let tok = self.peek();
        Error::parse(msg.into(), self.span(tok), None)
    }

    fn is_symbol(&self, s: &str) -> bool {
        self.peek().kind == TokKind::Symbol && self.peek().text == s
    }

    fn is_ident(&self, s: &str) -> bool {
        self.peek().kind == TokKind::Ident && self.peek().text == s
    }

    fn eat_symbol(&mut self, s: &str) -> PResult<()> {
        if self.is_symbol(s) {
            self.advance();
            Ok(())
        } else {
            Err(self.err_here(format!("expected '{s}', found '{}'", self.peek().text)))
        }
    }

    fn eat_ident(&mut self, s: &str) -> PResult<()> {
        if self.is_ident(s) {
            self.advance();
            Ok(())
        } else {
            Err(self.err_here(format!("expected '{s}', found '{}'", self.peek().text)))
        }
    }

    fn eat_name(&mut self) -> PResult<String> {
        if self.peek().kind == TokKind::Ident {
            Ok(self.advance().text)
        } else {
            Err(self.err_here("expected an identifier"))
        }
    }

    /// Doc comment attached to the declaration whose keyword starts at `line`.
    fn take_doc(&self, line: u32) -> Option<String> {
        self.docs.get(&(line.saturating_sub(1))).cloned()
    }

    // ---- top level -------------------------------------------------

    fn parse_root(&mut self) -> PResult<Root> {
        let mut items = Vec::new();
        while !self.is_eof() {
            items.push(self.parse_stmt()?);
        }
        Ok(Root { items })
    }

    fn parse_block(&mut self) -> PResult<Block> {
        self.eat_symbol("{")?;
        let mut stmts = Vec::new();
        while !self.is_symbol("}") {
            if self.is_eof() {
                return Err(self.err_here("unexpected end of input inside block"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.eat_symbol("}")?;
        Ok(Block::new(stmts))
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        if self.is_symbol("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.is_symbol("@") {
            return self.parse_fold().map(Stmt::Fold);
        }
        if self.peek().kind == TokKind::Ident {
            let word = self.peek().text.clone();
            match word.as_str() {
                "pragma" => return self.parse_pragma().map(Stmt::Pragma),
                "include" => return self.parse_include().map(Stmt::Include),
                "enum" => return self.parse_enum().map(Stmt::Enum),
                "struct" if self.peek_at(1).kind == TokKind::Ident && self.peek_at(2).text == "{" => {
                    return self.parse_struct_def().map(Stmt::StructDefinition);
                }
                "interface" => return self.parse_interface().map(Stmt::Interface),
                "contract" => return self.parse_contract().map(Stmt::Contract),
                "object" => return self.parse_object_block().map(Stmt::ObjectBlock),
                "code" => return self.parse_code_block().map(Stmt::CodeBlock),
                "data" => return self.parse_data_value().map(Stmt::DataValue),
                "constructor" => return self.parse_constructor(),
                "method" if self.peek_at(1).kind == TokKind::Ident => return self.parse_method(),
                "event" => return self.parse_event().map(Stmt::EventDecl),
                "error" => return self.parse_error_decl().map(Stmt::ErrorDecl),
                "const" => return self.parse_const_decl().map(Stmt::ConstDeclaration),
                "macro" => return self.parse_macro(),
                "function" => return self.parse_function_def().map(Stmt::FunctionDef),
                "let" => return self.parse_variable_decl().map(Stmt::VariableDeclaration),
                "if" => return self.parse_if().map(Stmt::If),
                "switch" => return self.parse_switch().map(Stmt::Switch),
                "for" => return self.parse_for().map(Stmt::ForLoop),
                "while" => return self.parse_while().map(Stmt::While),
                "do" => return self.parse_do_while().map(Stmt::DoWhile),
                "break" => {
                    self.advance();
                    return Ok(Stmt::Break);
                }
                "continue" => {
                    self.advance();
                    return Ok(Stmt::Continue);
                }
                "leave" => {
                    self.advance();
                    return Ok(Stmt::Leave);
                }
                "emit" => return self.parse_emit().map(Stmt::Emit),
                "throw" => return self.parse_throw().map(Stmt::Throw),
                _ => {}
            }
        }
        self.parse_assignment_or_expr_stmt()
    }

    fn parse_fold(&mut self) -> PResult<Fold> {
        let at_tok = self.advance(); // '@'
        let at = self.span(&at_tok);
        self.eat_ident("if")?;
        self.eat_symbol("(")?;
        let expr = self.parse_expr()?;
        self.eat_symbol(")")?;
        let block = self.parse_block()?;
        let mut elifs = Vec::new();
        loop {
            if self.is_symbol("@") && self.peek_at(1).text == "elif" {
                self.advance();
                self.advance();
                self.eat_symbol("(")?;
                let expr = self.parse_expr()?;
                self.eat_symbol(")")?;
                let block = self.parse_block()?;
                elifs.push(ElifBranch { expr, block });
            } else {
                break;
            }
        }
        let else_block = if self.is_symbol("@") && self.peek_at(1).text == "else" {
            self.advance();
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Fold {
            expr,
            block,
            elifs,
            else_block,
            at,
        })
    }

    fn parse_pragma(&mut self) -> PResult<Pragma> {
        let tok = self.advance(); // 'pragma'
        let at = self.span(&tok);
        let name_tok = self.advance();
        let name = name_tok
            .text
            .parse::<PragmaName>()
            .map_err(|_| Error::parse(format!("unknown pragma '{}'", name_tok.text), self.span(&name_tok), None))?;
        let value = self.parse_string_literal_text()?;
        Ok(Pragma { name, value, at })
    }

    fn parse_string_literal_text(&mut self) -> PResult<String> {
        if self.peek().kind != TokKind::StringLit {
            return Err(self.err_here("expected a string literal"));
        }
        let tok = self.advance();
        Ok(unescape(&tok.text[1..tok.text.len() - 1]))
    }

    fn parse_include(&mut self) -> PResult<IncludeCall> {
        let tok = self.advance(); // 'include'
        let at = self.span(&tok);
        let filename = self.parse_string_literal_text()?;
        Ok(IncludeCall {
            base_dir: String::new(),
            filename,
            at,
        })
    }

    fn parse_enum(&mut self) -> PResult<EnumDecl> {
        let tok = self.advance(); // 'enum'
        let at = self.span(&tok);
        let prefix = if self.peek().kind == TokKind::Ident && !self.is_symbol("{") {
            Some(self.eat_name()?)
        } else {
            None
        };
        self.eat_symbol("{")?;
        let mut members = Vec::new();
        while !self.is_symbol("}") {
            let name = self.eat_name()?;
            let expr = if self.is_symbol(":=") {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            members.push(EnumMember { name, expr });
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol("}")?;
        Ok(EnumDecl { prefix, members, at })
    }

    fn parse_struct_def(&mut self) -> PResult<StructDefinition> {
        let tok = self.advance(); // 'struct'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        self.eat_symbol("{")?;
        let mut members = Vec::new();
        while !self.is_symbol("}") {
            let ty = self.parse_abi_type()?;
            let name = self.eat_name()?;
            let default = if self.is_symbol(":=") {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            members.push(StructMember { ty, name, default });
            if self.is_symbol(";") {
                self.advance();
            }
        }
        self.eat_symbol("}")?;
        Ok(StructDefinition { name, members, at })
    }

    fn parse_abi_type(&mut self) -> PResult<AbiType> {
        let tok = self.advance();
        let other = tok.text.as_str();
        let (base, mut width) = if other == "address" {
            (AbiBase::Address, 160u16)
        } else if other == "bool" {
            (AbiBase::Bool, 8u16)
        } else if other == "function" {
            (AbiBase::Function, 192u16)
        } else if other == "bytes" {
            (AbiBase::Bytes, 0u16)
        } else if let Some(rest) = other.strip_prefix("uint") {
            (AbiBase::Uint, parse_width(rest, &tok, self)?)
        } else if let Some(rest) = other.strip_prefix("int") {
            (AbiBase::Int, parse_width(rest, &tok, self)?)
        } else if let Some(rest) = other.strip_prefix("bytes") {
            let n: u16 = rest
                .parse()
                .map_err(|_| Error::ty(format!("invalid bytesN type '{other}'"), Some(self.span(&tok))))?;
            (AbiBase::Bytes, n * 8)
        } else {
            return Err(Error::parse(format!("expected an ABI type, found '{other}'"), self.span(&tok), None));
        };
        if width == 0 && matches!(base, AbiBase::Uint | AbiBase::Int) {
            width = 256;
        }
        let is_array = if self.is_symbol("[") {
            self.advance();
            self.eat_symbol("]")?;
            true
        } else {
            false
        };
        Ok(AbiType::new(base, width, is_array))
    }

    fn parse_interface(&mut self) -> PResult<Interface> {
        let tok = self.advance(); // 'interface'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        self.eat_symbol("{")?;
        let mut constructor = None;
        let mut methods = Vec::new();
        while !self.is_symbol("}") {
            if self.is_ident("constructor") {
                constructor = Some(self.parse_constructor_decl()?);
            } else {
                methods.push(self.parse_method_decl()?);
            }
        }
        self.eat_symbol("}")?;
        Ok(Interface {
            name,
            constructor,
            methods,
            at,
        })
    }

    fn parse_method_params(&mut self) -> PResult<MethodParams> {
        self.eat_symbol("(")?;
        let mut params = Vec::new();
        while !self.is_symbol(")") {
            let ty = self.parse_abi_type()?;
            let name = if self.peek().kind == TokKind::Ident { Some(self.eat_name()?) } else { None };
            params.push(TypedParam { ty, name });
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        Ok(MethodParams { params })
    }

    fn parse_constructor_decl(&mut self) -> PResult<ConstructorDecl> {
        let tok = self.advance(); // 'constructor'
        let at = self.span(&tok);
        let params = self.parse_method_params()?;
        let payable = self.consume_modifier_word("payable");
        Ok(ConstructorDecl { params, payable, at })
    }

    fn consume_modifier_word(&mut self, word: &str) -> bool {
        if self.is_ident(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_method_decl(&mut self) -> PResult<MethodDecl> {
        let tok = self.advance(); // method name
        let at = self.span(&tok);
        let doc = self.take_doc(tok.line);
        let name = tok.text;
        let params = self.parse_method_params()?;
        let visibility = if self.consume_modifier_word("public") {
            Visibility::Public
        } else {
            self.consume_modifier_word("external");
            Visibility::External
        };
        let mutability = self.parse_mutability();
        let mut returns = Vec::new();
        if self.is_symbol("returns") || self.is_ident("returns") {
            self.advance();
            self.eat_symbol("(")?;
            while !self.is_symbol(")") {
                returns.push(self.parse_abi_type()?);
                if self.is_symbol(",") {
                    self.advance();
                }
            }
            self.eat_symbol(")")?;
        }
        Ok(MethodDecl {
            name,
            params,
            visibility,
            mutability,
            returns,
            doc,
            at,
        })
    }

    fn parse_mutability(&mut self) -> Mutability {
        if self.consume_modifier_word("payable") {
            Mutability::Payable
        } else if self.consume_modifier_word("view") {
            Mutability::View
        } else if self.consume_modifier_word("pure") {
            Mutability::Pure
        } else {
            Mutability::NonPayable
        }
    }

    fn parse_contract(&mut self) -> PResult<Contract> {
        let tok = self.advance(); // 'contract'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        let body = self.parse_block()?;
        Ok(Contract { name, body, at })
    }

    fn parse_object_block(&mut self) -> PResult<ObjectBlock> {
        let tok = self.advance(); // 'object'
        let at = self.span(&tok);
        let name = self.parse_string_literal_text()?;
        let body = self.parse_block()?;
        Ok(ObjectBlock { name, body, at })
    }

    fn parse_code_block(&mut self) -> PResult<CodeBlock> {
        let tok = self.advance(); // 'code'
        let at = self.span(&tok);
        let body = self.parse_block()?;
        Ok(CodeBlock { body, at })
    }

    fn parse_data_value(&mut self) -> PResult<DataValue> {
        self.advance(); // 'data'
        let name = self.parse_string_literal_text()?;
        let bytes = if self.peek().kind == TokKind::HexStringLit {
            let tok = self.advance();
            hex_literal_bytes(&tok.text)
        } else {
            self.parse_string_literal_text()?.into_bytes()
        };
        Ok(DataValue { name, bytes })
    }

    fn parse_constructor(&mut self) -> PResult<Stmt> {
        let tok = self.advance(); // 'constructor'
        let at = self.span(&tok);
        let params = self.parse_method_params()?;
        let payable = self.consume_modifier_word("payable");
        let unchecked = self.consume_modifier_word("unchecked");
        if self.is_symbol("{") {
            let body = self.parse_block()?;
            Ok(Stmt::ConstructorDef(ConstructorDef {
                params,
                payable,
                unchecked,
                body,
                at,
            }))
        } else {
            Ok(Stmt::ConstructorDecl(ConstructorDecl { params, payable, at }))
        }
    }

    fn parse_method(&mut self) -> PResult<Stmt> {
        self.advance(); // 'method'
        let decl = self.parse_method_decl()?;
        let locked = self.is_ident("locked");
        if locked {
            self.advance();
        }
        if self.is_symbol("{") {
            let body = self.parse_block()?;
            Ok(Stmt::MethodDef(MethodDef {
                name: decl.name,
                params: decl.params,
                visibility: decl.visibility,
                mutability: decl.mutability,
                locked,
                returns: decl.returns,
                body,
                doc: decl.doc,
                at: decl.at,
            }))
        } else {
            Ok(Stmt::MethodDecl(decl))
        }
    }

    fn parse_event(&mut self) -> PResult<EventDecl> {
        let tok = self.advance(); // 'event'
        let at = self.span(&tok);
        let doc = self.take_doc(tok.line);
        let name = self.eat_name()?;
        self.eat_symbol("(")?;
        let mut params = Vec::new();
        while !self.is_symbol(")") {
            let ty = self.parse_abi_type()?;
            let indexed = self.consume_modifier_word("indexed");
            let name = self.eat_name()?;
            params.push(EventParam { ty, name, indexed });
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        let anonymous = self.consume_modifier_word("anonymous");
        let packed = self.consume_modifier_word("packed");
        let inline = !self.consume_modifier_word("noinline");
        Ok(EventDecl {
            name,
            params,
            anonymous,
            packed,
            inline,
            doc,
            at,
        })
    }

    fn parse_error_decl(&mut self) -> PResult<ErrorDecl> {
        let tok = self.advance(); // 'error'
        let at = self.span(&tok);
        let doc = self.take_doc(tok.line);
        let name = self.eat_name()?;
        self.eat_symbol("(")?;
        let mut params = Vec::new();
        while !self.is_symbol(")") {
            let ty = self.parse_abi_type()?;
            let name = self.eat_name()?;
            params.push(ErrorParam { ty, name });
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        Ok(ErrorDecl { name, params, doc, at })
    }

    fn parse_const_decl(&mut self) -> PResult<ConstDeclaration> {
        let tok = self.advance(); // 'const'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        let is_function = self.is_symbol("(");
        let params = if is_function {
            self.advance();
            let mut ps = Vec::new();
            while !self.is_symbol(")") {
                ps.push(self.eat_name()?);
                if self.is_symbol(",") {
                    self.advance();
                }
            }
            self.eat_symbol(")")?;
            Some(ps)
        } else {
            None
        };
        self.eat_symbol(":=")?;
        let expr = self.parse_expr()?;
        Ok(ConstDeclaration {
            name,
            params,
            expr,
            is_function,
            at,
        })
    }

    fn parse_macro(&mut self) -> PResult<Stmt> {
        let tok = self.advance(); // 'macro'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        if self.is_symbol(":=") {
            self.advance();
            let expr = self.parse_expr()?;
            return Ok(Stmt::MacroConstant(MacroConstant { name, expr, at }));
        }
        self.eat_symbol("(")?;
        let mut params = Vec::new();
        while !self.is_symbol(")") {
            params.push(self.eat_name()?);
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        let body = self.parse_block()?;
        Ok(Stmt::MacroDefinition(MacroDefinition { name, params, body, at }))
    }

    fn parse_function_def(&mut self) -> PResult<FunctionDef> {
        let tok = self.advance(); // 'function'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        self.eat_symbol("(")?;
        let mut params = Vec::new();
        while !self.is_symbol(")") {
            params.push(self.eat_name()?);
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        let modifier = if self.consume_modifier_word("noinline") {
            FunctionModifier::Noinline
        } else {
            FunctionModifier::None
        };
        let mut returns = Vec::new();
        if self.is_symbol("->") {
            self.advance();
            loop {
                returns.push(self.eat_name()?);
                if self.is_symbol(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let body = self.parse_block()?;
        Ok(FunctionDef {
            name,
            params,
            returns,
            modifier,
            body,
            builtin: false,
            at,
        })
    }

    fn parse_typed_identifier_list(&mut self) -> PResult<TypedIdentifierList> {
        let mut idents = Vec::new();
        loop {
            let name = self.eat_name()?;
            let ty = if self.is_symbol(":") {
                self.advance();
                Some(self.eat_name()?)
            } else {
                None
            };
            idents.push(TypedIdentifier { name, ty });
            if self.is_symbol(",") {
                self.advance();
            } else {
                break;
            }
        }
        Ok(TypedIdentifierList { idents })
    }

    fn parse_variable_decl(&mut self) -> PResult<VariableDeclaration> {
        let tok = self.advance(); // 'let'
        let at = self.span(&tok);
        let idents = self.parse_typed_identifier_list()?;
        let init = if self.is_symbol(":=") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(VariableDeclaration { idents, init, at })
    }

    fn parse_if(&mut self) -> PResult<If> {
        let tok = self.advance(); // 'if'
        let at = self.span(&tok);
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(If { cond, body, at })
    }

    fn parse_switch(&mut self) -> PResult<Switch> {
        let tok = self.advance(); // 'switch'
        let at = self.span(&tok);
        let expr = self.parse_expr()?;
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            if self.is_ident("case") {
                self.advance();
                let value = self.parse_literal()?;
                let body = self.parse_block()?;
                cases.push(Case { value, body });
            } else if self.is_ident("default") {
                self.advance();
                default = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(Switch {
            expr,
            cases,
            default,
            at,
        })
    }

    fn parse_for(&mut self) -> PResult<ForLoop> {
        let tok = self.advance(); // 'for'
        let at = self.span(&tok);
        let init = self.parse_block()?;
        let cond = self.parse_expr()?;
        let post = self.parse_block()?;
        let body = self.parse_block()?;
        Ok(ForLoop {
            init,
            cond,
            post,
            body,
            at,
        })
    }

    fn parse_while(&mut self) -> PResult<While> {
        let tok = self.advance(); // 'while'
        let at = self.span(&tok);
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(While { cond, body, at })
    }

    fn parse_do_while(&mut self) -> PResult<DoWhile> {
        let tok = self.advance(); // 'do'
        let at = self.span(&tok);
        let body = self.parse_block()?;
        self.eat_ident("while")?;
        let cond = self.parse_expr()?;
        Ok(DoWhile { body, cond, at })
    }

    fn parse_emit(&mut self) -> PResult<Emit> {
        let tok = self.advance(); // 'emit'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        self.eat_symbol("(")?;
        let offset = Box::new(self.parse_expr()?);
        let mut args = Vec::new();
        while self.is_symbol(",") {
            self.advance();
            args.push(self.parse_expr()?);
        }
        self.eat_symbol(")")?;
        Ok(Emit { name, offset, args, at })
    }

    fn parse_throw(&mut self) -> PResult<Throw> {
        let tok = self.advance(); // 'throw'
        let at = self.span(&tok);
        let name = self.eat_name()?;
        self.eat_symbol("(")?;
        let mut args = Vec::new();
        while !self.is_symbol(")") {
            args.push(self.parse_expr()?);
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        Ok(Throw { name, args, at })
    }

    /// Disambiguates `MemberAssignment` (`a->b := ...` / `a->b |= ...`) from
    /// a bare assignment/expression statement by scanning ahead for `:=`/`|=`
    /// after consuming an identifier list, per §4.2's two backtracking points.
    fn parse_assignment_or_expr_stmt(&mut self) -> PResult<Stmt> {
        let start = self.pos;
        if self.peek().kind == TokKind::Ident && self.peek_at(1).text == "->" {
            let target = self.parse_member_identifier()?;
            if self.is_symbol(":=") || self.is_symbol("|=") {
                let or_flag = self.is_symbol("|=");
                self.advance();
                let rhs = self.parse_expr()?;
                return Ok(Stmt::MemberAssignment(MemberAssignment {
                    target,
                    rhs,
                    or_flag,
                    at: self.span(&self.tokens[start]),
                }));
            }
            // Not actually an assignment: rewind and fall through to a bare
            // expression statement (a `MemberIdentifier` read for its
            // side-effect-free value makes no sense as a statement on its
            // own, but nested parses reach this path via recursion).
            self.pos = start;
        }
        if self.peek().kind == TokKind::Ident {
            let mut lookahead = self.pos;
            let mut names = Vec::new();
            loop {
                if self.tokens[lookahead].kind != TokKind::Ident {
                    break;
                }
                names.push(self.tokens[lookahead].text.clone());
                lookahead += 1;
                if self.tokens.get(lookahead).map(|t| t.text.as_str()) == Some(",") {
                    lookahead += 1;
                    continue;
                }
                break;
            }
            if !names.is_empty() && self.tokens.get(lookahead).map(|t| t.text.as_str()) == Some(":=") {
                for _ in 0..names.len() {
                    self.advance();
                    if self.is_symbol(",") {
                        self.advance();
                    }
                }
                self.eat_symbol(":=")?;
                let rhs = self.parse_expr()?;
                return Ok(Stmt::Assignment(Assignment {
                    lhs: IdentifierList { names },
                    rhs,
                    at: self.span(&self.tokens[start]),
                }));
            }
        }
        let expr = self.parse_expr()?;
        Ok(Stmt::Expr(expr))
    }

    // ---- expressions -------------------------------------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
        if self.peek().kind == TokKind::Ident && self.peek_at(1).text == "->" {
            return Ok(Expr::MemberIdentifier(self.parse_member_identifier()?));
        }
        if self.is_symbol("&") && self.peek_at(1).kind == TokKind::Ident && self.peek_at(1).text.starts_with("calldata.")
        {
            self.advance();
            return self.parse_calldata_identifier(true);
        }
        if self.peek().kind == TokKind::Ident && self.peek().text.starts_with("calldata.") {
            return self.parse_calldata_identifier(false);
        }
        if self.is_ident("struct") {
            return self.parse_struct_initializer();
        }
        if let Some(kind) = self.interface_call_kind() {
            return self.parse_interface_call(kind);
        }
        if self.peek().kind == TokKind::Ident && self.peek_at(1).text == "(" {
            return self.parse_function_call();
        }
        if matches!(
            self.peek().kind,
            TokKind::Number | TokKind::HexNumber | TokKind::StringLit | TokKind::HexStringLit
        ) || self.is_ident("true")
            || self.is_ident("false")
        {
            return Ok(Expr::Literal(self.parse_literal()?));
        }
        if self.peek().kind == TokKind::Ident {
            let tok = self.advance();
            return Ok(Expr::Identifier(Identifier::new(tok.text)));
        }
        Err(self.err_here(format!("unexpected token '{}' in expression", self.peek().text)))
    }

    /// `create.Foo`, `create2.Foo`, `call.IERC20.transfer` and
    /// `trycall.IERC20.transfer` all tokenize as one fused identifier since
    /// `.` is an identifier-continuation character in this grammar.
    fn interface_call_kind(&self) -> Option<InterfaceCallKind> {
        if self.peek().kind != TokKind::Ident {
            return None;
        }
        let text = self.peek().text.as_str();
        if text.starts_with("create2.") {
            Some(InterfaceCallKind::Create2)
        } else if text.starts_with("create.") {
            Some(InterfaceCallKind::Create)
        } else if text.starts_with("call.") || text.starts_with("trycall.") {
            Some(InterfaceCallKind::Call)
        } else {
            None
        }
    }

    fn parse_interface_call(&mut self, kind: InterfaceCallKind) -> PResult<Expr> {
        let tok = self.advance();
        let at = self.span(&tok);
        let parts: Vec<&str> = tok.text.split('.').collect();
        let attempt = parts.first() == Some(&"trycall");
        let (name, method) = match kind {
            InterfaceCallKind::Call => {
                if parts.len() != 3 {
                    return Err(Error::parse(
                        format!("malformed interface call '{}'", tok.text),
                        at,
                        None,
                    ));
                }
                (parts[1].to_owned(), Some(parts[2].to_owned()))
            }
            InterfaceCallKind::Create | InterfaceCallKind::Create2 => {
                if parts.len() != 2 {
                    return Err(Error::parse(
                        format!("malformed interface call '{}'", tok.text),
                        at,
                        None,
                    ));
                }
                (parts[1].to_owned(), None)
            }
        };
        self.eat_symbol("(")?;
        let mut args = Vec::new();
        while !self.is_symbol(")") {
            args.push(self.parse_expr()?);
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        Ok(Expr::InterfaceCall(InterfaceCall {
            kind,
            attempt,
            name,
            method,
            args,
            at,
        }))
    }

    fn parse_function_call(&mut self) -> PResult<Expr> {
        let tok = self.advance();
        let line = tok.line;
        let mut name = tok.text;
        // dotted built-in namespaces (`method.select`, `require.eq`, ...)
        // are tokenized as one maximal-match identifier already since `.`
        // is an identifier-continuation character in this grammar.
        if self.is_symbol("(") {
            self.advance();
        } else if self.is_symbol(".") {
            // defensive: shouldn't happen given maximal munch, but keep the
            // parser robust if a future grammar tweak splits the dot off.
            while self.is_symbol(".") {
                self.advance();
                name.push('.');
                name.push_str(&self.eat_name()?);
            }
            self.eat_symbol("(")?;
        }
        let mut args = Vec::new();
        while !self.is_symbol(")") {
            args.push(self.parse_expr()?);
            if self.is_symbol(",") {
                self.advance();
            }
        }
        self.eat_symbol(")")?;
        Ok(Expr::FunctionCall(FunctionCall {
            name,
            args,
            filename: self.filename.clone(),
            line,
        }))
    }

    fn parse_member_identifier(&mut self) -> PResult<MemberIdentifier> {
        let tok = self.advance();
        let at = self.span(&tok);
        let base = tok.text;
        self.eat_symbol("->")?;
        let member = self.eat_name()?;
        Ok(MemberIdentifier {
            base,
            cast: None,
            member,
            at,
        })
    }

    /// `calldata.foo` tokenizes as one fused identifier (`.` continues an
    /// identifier in this grammar); `by_ref` is set by the caller when a
    /// leading `&` was consumed for the `&calldata.foo` offset-of form.
    fn parse_calldata_identifier(&mut self, by_ref: bool) -> PResult<Expr> {
        let tok = self.advance();
        let at = self.span(&tok);
        let member = tok
            .text
            .strip_prefix("calldata.")
            .ok_or_else(|| Error::parse(format!("malformed calldata reference '{}'", tok.text), at.clone(), None))?
            .to_owned();
        Ok(Expr::CallDataIdentifier(CallDataIdentifier { member, by_ref, at }))
    }

    fn parse_struct_initializer(&mut self) -> PResult<Expr> {
        let tok = self.advance(); // 'struct'
        let at = self.span(&tok);
        self.eat_symbol("(")?;
        let struct_name = self.eat_name()?;
        let mut args = Vec::new();
        while self.is_symbol(",") {
            self.advance();
            if self.is_symbol("@") {
                self.advance();
                args.push(StructInitArg::Default);
            } else {
                args.push(StructInitArg::Expr(self.parse_expr()?));
            }
        }
        self.eat_symbol(")")?;
        Ok(Expr::StructInitializer(StructInitializer { struct_name, args, at }))
    }

    fn parse_literal(&mut self) -> PResult<Literal> {
        let tok = self.advance();
        let span = self.span(&tok);
        match tok.kind {
            TokKind::Number => {
                let unit = self.peek_unit_suffix();
                Literal::parse_decimal(&tok.text, unit, &span)
            }
            TokKind::HexNumber => Literal::parse_hex(&tok.text, &span),
            TokKind::StringLit => Ok(Literal::string(unescape(&tok.text[1..tok.text.len() - 1]))),
            TokKind::HexStringLit => {
                // Keep the raw hex digits in `text` (not a lossy UTF-8
                // decode of the bytes they encode) so both re-serialization
                // and compile-time hash folding see the exact byte string.
                let digits = tok.text[4..tok.text.len() - 1].to_owned();
                let mut lit = Literal::string(digits);
                lit.kind = LiteralKind::HexLiteral;
                Ok(lit)
            }
            TokKind::Ident if tok.text == "true" => Ok(Literal::bool_literal(true)),
            TokKind::Ident if tok.text == "false" => Ok(Literal::bool_literal(false)),
            _ => Err(Error::parse(format!("expected a literal, found '{}'", tok.text), span, None)),
        }
    }

    /// Consumes a bare unit-suffix identifier (`wei`/`gwei`/`ether`/...)
    /// immediately following a decimal literal, if present.
    fn peek_unit_suffix(&mut self) -> Option<LiteralUnit> {
        if self.peek().kind != TokKind::Ident {
            return None;
        }
        let unit = match self.peek().text.as_str() {
            "wei" => LiteralUnit::Wei,
            "gwei" => LiteralUnit::Gwei,
            "ether" => LiteralUnit::Ether,
            "seconds" => LiteralUnit::Seconds,
            "minutes" => LiteralUnit::Minutes,
            "hours" => LiteralUnit::Hours,
            "days" => LiteralUnit::Days,
            "weeks" => LiteralUnit::Weeks,
            _ => return None,
        };
        self.advance();
        Some(unit)
    }
}

fn parse_width(rest: &str, tok: &Token, parser: &Parser) -> PResult<u16> {
    if rest.is_empty() {
        return Ok(256);
    }
    rest.parse::<u16>()
        .map_err(|_| Error::ty(format!("invalid width in type '{}'", tok.text), Some(parser.span(tok))))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn hex_literal_bytes(tok_text: &str) -> Vec<u8> {
    let inner = &tok_text[4..tok_text.len() - 1]; // strip `hex"` and trailing `"`
    let chars: Vec<char> = inner.chars().collect();
    let mut bytes = Vec::with_capacity(chars.len().div_ceil(2));
    let mut i = 0;
    while i < chars.len() {
        let hi = chars[i].to_digit(16).unwrap_or(0);
        let lo = chars.get(i + 1).and_then(|c| c.to_digit(16)).unwrap_or(0);
        bytes.push(((hi << 4) | lo) as u8);
        i += 2;
    }
    bytes
}
