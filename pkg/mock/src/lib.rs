//! Procedural macros for generating mock implementations.
//!
//! # async_client
//!
//! Generates a mock implementation for an async client trait, e.g. the HTTP
//! transport used by `appleid`.
//!
//! Use `#[cfg_attr(test, mock::async_client)]` before `#[async_trait]` to generate
//! the mock only during test compilation:
//!
//! ```ignore
//! use async_trait::async_trait;
//!
//! #[cfg_attr(test, mock::async_client)]
//! #[async_trait]
//! pub trait HttpTransport: Send + Sync + 'static {
//!     async fn get(&self, url: &str) -> Result<HttpResponse, BoxError>;
//! }
//!
//! // Generates:
//! // pub struct MockHttpTransport {
//! //     pub get: Mutex<VecDeque<Result<HttpResponse, BoxError>>>,
//! //     pub get_call_count: AtomicUsize,
//! //     pub get_args: Mutex<Vec<String>>,
//! // }
//! // impl Default for MockHttpTransport { ... }
//! // #[async_trait] impl HttpTransport for MockHttpTransport { ... }
//! ```
//!
//! Results are handed out in the order they were queued. Every call records the
//! `Debug` rendering of its arguments.
//!
//! ## Checking Calls in Tests
//!
//! ```ignore
//! assert_eq!(mock.get_calls(), 2);
//! assert!(mock.get_args()[0].contains("https://appleid.apple.com/auth/keys"));
//! ```

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{FnArg, ItemTrait, Pat, ReturnType, TraitItem, parse_macro_input};

/// Generates a mock implementation for an async trait.
#[proc_macro_attribute]
pub fn async_client(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);
    let trait_name = &input.ident;
    let mock_name = format_ident!("Mock{}", trait_name);
    let vis = &input.vis;

    let mut field_definitions = Vec::new();
    let mut default_fields = Vec::new();
    let mut impl_methods = Vec::new();
    let mut accessor_methods = Vec::new();

    for item in &input.items {
        if let TraitItem::Fn(method) = item {
            let method_name = &method.sig.ident;
            let call_count_field = format_ident!("{}_call_count", method_name);
            let call_count_method = format_ident!("{}_calls", method_name);
            let args_field = format_ident!("{}_args", method_name);

            let return_type = match &method.sig.output {
                ReturnType::Default => quote! { () },
                ReturnType::Type(_, ty) => quote! { #ty },
            };

            field_definitions.push(quote! {
                pub #method_name: ::std::sync::Mutex<::std::collections::VecDeque<#return_type>>
            });

            field_definitions.push(quote! {
                pub #call_count_field: ::std::sync::atomic::AtomicUsize
            });

            field_definitions.push(quote! {
                pub #args_field: ::std::sync::Mutex<::std::vec::Vec<::std::string::String>>
            });

            default_fields.push(quote! {
                #method_name: ::std::sync::Mutex::new(::std::collections::VecDeque::new())
            });

            default_fields.push(quote! {
                #call_count_field: ::std::sync::atomic::AtomicUsize::new(0)
            });

            default_fields.push(quote! {
                #args_field: ::std::sync::Mutex::new(::std::vec::Vec::new())
            });

            accessor_methods.push(quote! {
                pub fn #call_count_method(&self) -> usize {
                    self.#call_count_field.load(::std::sync::atomic::Ordering::SeqCst)
                }

                pub fn #args_field(&self) -> ::std::vec::Vec<::std::string::String> {
                    self.#args_field.lock().unwrap().clone()
                }
            });

            let mut params = Vec::new();
            let mut arg_names = Vec::new();
            for arg in &method.sig.inputs {
                if let FnArg::Typed(pat_type) = arg {
                    let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
                        continue;
                    };
                    let name = &pat_ident.ident;
                    let ty = &pat_type.ty;
                    params.push(quote! { #name: #ty });
                    arg_names.push(quote! { #name });
                }
            }

            let method_label = method_name.to_string();
            impl_methods.push(quote! {
                async fn #method_name(&self, #(#params),*) -> #return_type {
                    self.#call_count_field.fetch_add(1, ::std::sync::atomic::Ordering::SeqCst);
                    self.#args_field
                        .lock()
                        .unwrap()
                        .push(::std::format!("{:?}", (#(&#arg_names,)*)));
                    self.#method_name
                        .lock()
                        .unwrap()
                        .pop_front()
                        .unwrap_or_else(|| ::std::panic!("no mocked result queued for `{}`", #method_label))
                }
            });
        }
    }

    let expanded = quote! {
        #input

        #vis struct #mock_name {
            #(#field_definitions),*
        }

        impl ::std::default::Default for #mock_name {
            fn default() -> Self {
                Self {
                    #(#default_fields),*
                }
            }
        }

        impl #mock_name {
            #(#accessor_methods)*
        }

        #[::async_trait::async_trait]
        impl #trait_name for #mock_name {
            #(#impl_methods)*
        }
    };

    TokenStream::from(expanded)
}
