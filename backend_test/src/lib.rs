use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type, TypePath,
};

/// Run an async test against a live server backed by a throwaway database.
///
/// The test may ask for a [`rocket::local::asynchronous::Client`] (as `Client`),
/// a [`mongodb::Database`] (as `Database`), and any number of
/// `crate::model::mongodb::Coll<T>`. Pass `admin` or `voter` to start the test
/// logged in. The database is dropped however the test ends. When no database
/// server is reachable the test fails, unless `BALLOTBOX_SKIP_DB_TESTS` is set,
/// in which case it is skipped with a warning.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let injected = match inspect_signature(&item_fn.sig) {
        Ok(injected) => injected,
        Err(err) => return err.into_compile_error().into(),
    };

    let login = match parse_macro_input!(args as Option<Ident>) {
        None => quote! {},
        Some(role) if role == "admin" => admin_login(),
        Some(role) if role == "voter" => voter_login(),
        Some(role) => {
            return syn::Error::new(role.span(), "Expected `admin` or `voter`")
                .into_compile_error()
                .into()
        }
    };

    // The test body keeps its code but moves out of the way of the generated test.
    let name = item_fn.sig.ident.clone();
    let body_name = format_ident!("{}_body", name);
    item_fn.sig.ident = body_name.clone();

    let Injected {
        args,
        coll_idents,
        coll_types,
    } = injected;

    quote! {
        #[test]
        fn #name() {
            async fn setup() -> Option<(rocket::local::asynchronous::Client, mongodb::Database)> {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["ballotbox_backend"],
                    None,
                    None,
                );

                let db_client = crate::db_client().await;
                if !crate::db_reachable(&db_client).await {
                    if crate::db_tests_skipped() {
                        eprintln!("skipping {}: no database server reachable", stringify!(#name));
                        return None;
                    }
                    panic!(
                        "No database server reachable; start one or set {}=1 to skip database tests",
                        crate::SKIP_DB_TESTS_VAR,
                    );
                }
                let db_name = crate::database();
                let db = db_client.database(&db_name);
                let rocket = crate::rocket_for_db_and_notifier(
                    db_client,
                    &db_name,
                    crate::notifier::BroadcastNotifier::new(),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                #login

                Some((rocket_client, db))
            }

            #item_fn

            // Setup and cleanup get their own runtime, so a panicking test
            // cannot take the cleanup down with it.
            let housekeeping = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-housekeeping")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let worker = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let Some((rocket_client, db)) = housekeeping.block_on(setup()) else {
                return;
            };

            let state = std::sync::Mutex::new((rocket_client, db.clone(), worker));
            let outcome = std::panic::catch_unwind(|| {
                let (rocket_client, db, worker) = state.into_inner().unwrap();
                #(
                    let #coll_idents = crate::model::mongodb::Coll::<#coll_types>::from_db(&db);
                )*
                worker.block_on(#body_name(#(#args,)* #(#coll_idents),*));
            });

            housekeeping.block_on(async move {
                if let Err(e) = db.drop(None).await {
                    eprintln!("failed to drop test database: {e}");
                }
            });

            if let Err(cause) = outcome {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Insert the example admin and log in as them.
fn admin_login() -> TokenStream2 {
    quote! {
        crate::model::mongodb::Coll::<crate::model::db::user::NewUser>::from_db(&db)
            .insert_one(crate::model::db::user::NewUser::admin_example(), None)
            .await
            .unwrap();

        let response = rocket_client
            .post(uri!(crate::api::auth::login))
            .header(rocket::http::ContentType::JSON)
            .body(
                rocket::serde::json::json!({
                    "username": "coordinator",
                    "password": "example_password",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(rocket::http::Status::Ok, response.status(), "admin login failed");
        // Responses borrow the client, which is about to be handed to the test.
        drop(response);
    }
}

/// Register the first example voter and log in as them.
fn voter_login() -> TokenStream2 {
    quote! {
        let registration = crate::model::api::auth::Registration::example1();
        let response = rocket_client
            .post(uri!(crate::api::auth::register))
            .header(rocket::http::ContentType::JSON)
            .body(rocket::serde::json::json!(registration).to_string())
            .dispatch()
            .await;
        assert_eq!(rocket::http::Status::Ok, response.status(), "voter registration failed");
        drop(response);

        let credentials = crate::model::api::auth::LoginCredentials::for_registration(&registration);
        let response = rocket_client
            .post(uri!(crate::api::auth::login))
            .header(rocket::http::ContentType::JSON)
            .body(rocket::serde::json::json!(credentials).to_string())
            .dispatch()
            .await;
        assert_eq!(rocket::http::Status::Ok, response.status(), "voter login failed");
        drop(response);
    }
}

/// What to pass to the test body, in parameter order for the client and
/// database, followed by the collections.
struct Injected {
    args: Vec<TokenStream2>,
    coll_idents: Vec<Ident>,
    coll_types: Vec<Ident>,
}

/// Check the test is async and that every parameter is something we can inject.
fn inspect_signature(sig: &Signature) -> Result<Injected, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut injected = Injected {
        args: vec![],
        coll_idents: vec![],
        coll_types: vec![],
    };
    let mut seen_client = false;
    let mut seen_db = false;

    for input in &sig.inputs {
        let unexpected = || {
            syn::Error::new(
                input.span(),
                "Expected `client: Client`, `db: Database` or `collection: Coll<T>`",
            )
        };
        let FnArg::Typed(pat_type) = input else {
            return Err(unexpected());
        };
        let (Pat::Ident(pat_ident), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) else {
            return Err(unexpected());
        };

        match type_path.path.get_ident() {
            Some(ident) if ident == "Client" => {
                if seen_client {
                    return Err(syn::Error::new(input.span(), "Only one `Client` can be injected"));
                }
                seen_client = true;
                injected.args.push(quote! { rocket_client });
            }
            Some(ident) if ident == "Database" => {
                if seen_db {
                    return Err(syn::Error::new(input.span(), "Only one `Database` can be injected"));
                }
                seen_db = true;
                injected.args.push(quote! { db.clone() });
            }
            Some(_) => return Err(unexpected()),
            None => {
                let item = collection_item(type_path).ok_or_else(unexpected)?;
                injected.coll_idents.push(pat_ident.ident.clone());
                injected.coll_types.push(item);
            }
        }
    }

    Ok(injected)
}

/// The `T` in `Coll<T>`, when `T` is a plain identifier.
fn collection_item(type_path: &TypePath) -> Option<Ident> {
    let last = type_path.path.segments.last()?;
    if last.ident != "Coll" {
        return None;
    }
    let PathArguments::AngleBracketed(generics) = &last.arguments else {
        return None;
    };
    match generics.args.first()? {
        GenericArgument::Type(Type::Path(item)) => item.path.get_ident().cloned(),
        _ => None,
    }
}
