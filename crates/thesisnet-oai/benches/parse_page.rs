use thesisnet_oai::{normalize, parse_page};

/// One ListRecords page shaped like a DSpace 7 oai_dc response.
fn synthetic_page(records: usize) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><ListRecords>"#,
    );
    for i in 0..records {
        body.push_str(&format!(
            r#"<record><header><identifier>oai:bench:{i}</identifier><datestamp>2024-01-01</datestamp></header>
<metadata><oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/" xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:title>Hydrological modelling of catchment {i}</dc:title>
<dc:creator>Author, {i}</dc:creator>
<dc:contributor>Supervisor, A. (Supervisor)</dc:contributor>
<dc:subject>Hydrology</dc:subject><dc:subject>Water resources</dc:subject>
<dc:description>Thesis (PhD)--University of Somewhere, 2019. An abstract with &amp; entities and <![CDATA[raw < text]]>.</dc:description>
<dc:date>2019-06-0{d}T00:00:00Z</dc:date>
<dc:type>Doctoral Thesis</dc:type>
<dc:identifier>http://hdl.handle.net/11427/{i}</dc:identifier>
</oai_dc:dc></metadata></record>"#,
            d = i % 9 + 1
        ));
    }
    body.push_str(r#"<resumptionToken completeListSize="10000">token</resumptionToken></ListRecords></OAI-PMH>"#);
    body
}

#[divan::bench]
fn parse_100_records(bencher: divan::Bencher) {
    let body = synthetic_page(100);
    bencher.bench(|| parse_page(divan::black_box(&body)).unwrap());
}

#[divan::bench]
fn parse_and_normalize_100_records(bencher: divan::Bencher) {
    let body = synthetic_page(100);
    bencher.bench(|| {
        let page = parse_page(divan::black_box(&body)).unwrap();
        page.records
            .iter()
            .filter_map(|raw| normalize(raw, "Bench University", None))
            .count()
    });
}

fn main() {
    divan::main();
}
