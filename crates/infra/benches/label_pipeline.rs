use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use lopdf::{Document, Object, Stream, dictionary};
use std::sync::Arc;

use forgeship_core::{InfoPackageId, OrderId, ShopId};
use forgeship_infra::repository::{InMemoryShipmentStore, ShipmentRepository};
use forgeship_infra::{InMemoryLabelStorage, LabelPrinter, LabelStorage, merge_pdfs};
use forgeship_shipments::{NewLabel, ShipmentRecord, ShipmentWrite};

fn label_pdf(n: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = format!("BT /F1 12 Tf 20 400 Td (PARCEL {n}) Tj ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 288.into(), 432.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_pdfs");
    for count in [1usize, 10, 50] {
        let documents: Vec<Vec<u8>> = (0..count).map(label_pdf).collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &documents, |b, docs| {
            b.iter(|| merge_pdfs(black_box(docs)).unwrap());
        });
    }
    group.finish();
}

/// Print path over in-memory storage: key resolution, blob reads, merge,
/// printed flags.
fn bench_print_labels(c: &mut Criterion) {
    let store = Arc::new(InMemoryShipmentStore::new());
    let storage = Arc::new(InMemoryLabelStorage::new());
    let labels: Vec<NewLabel> = (0..10)
        .map(|i| NewLabel {
            package_id: format!("PKG-{i}"),
            tracker_code: None,
            label_type: None,
            storage_key: format!("bench-{i}"),
            payload: None,
            payload_kind: None,
            shop_id: ShopId::new(1),
        })
        .collect();
    for i in 0..10 {
        storage.write(&format!("bench-{i}"), &label_pdf(i)).unwrap();
    }
    let (shipment, _) = store
        .commit(ShipmentWrite {
            target: None,
            record: ShipmentRecord {
                order_id: OrderId::new(1),
                order_reference: "BENCH".to_string(),
                shipment_number: "B-1".to_string(),
                product: "bench".to_string(),
                company_id: None,
                info_package_id: InfoPackageId::new(1),
                request_payload: None,
                response_payload: None,
                shop_id: ShopId::new(1),
            },
            labels,
        })
        .unwrap();
    let printer = LabelPrinter::new(store, storage);

    c.bench_function("print_labels/10", |b| {
        b.iter(|| printer.print_labels(black_box(shipment.id)).unwrap());
    });
}

criterion_group!(benches, bench_merge, bench_print_labels);
criterion_main!(benches);
