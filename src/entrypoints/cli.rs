use clap::Parser;

/// Parses from the command line arguments on native and from GET parameters on web.
#[allow(dead_code)]
pub fn parse_args<T: Parser>() -> Result<T, clap::Error> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        T::try_parse()
    }
    #[cfg(target_arch = "wasm32")]
    {
        // On web, arguments come from `cli`-prefixed GET parameters, e.g.
        // `?cliwebmap=<url>` maps to `--webmap <url>`.
        let href = web_sys::window()
            .and_then(|w| w.location().href().ok())
            .unwrap_or_default();
        let query = href.split_once('?').map(|(_, q)| q).unwrap_or("");

        let mut args = vec!["webmap-inspector".to_string()];
        for pair in query.split('&') {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, Some(v)),
                None => (pair, None),
            };
            let Some(arg_key) = key.strip_prefix("cli") else {
                continue;
            };
            if !arg_key.is_empty() {
                args.push(format!("--{arg_key}"));
            }
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                args.push(value.to_string());
            }
        }

        T::try_parse_from(args)
    }
}
